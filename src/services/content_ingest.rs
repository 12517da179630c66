//! 课件入库服务 - 业务能力层
//!
//! 拉取课件快照 → 保存原始快照 → 解析题目 → 补全答案 → 写入题库

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::{AnswerLookup, ContentFetcher};
use crate::error::{AppResult, FileError};
use crate::models::ContentUnit;
use crate::services::AnswerCache;

/// 课件入库服务
pub struct ContentIngest {
    fetcher: Arc<dyn ContentFetcher>,
    lookup: Arc<dyn AnswerLookup>,
    cache: Arc<AnswerCache>,
    snapshot_dir: PathBuf,
}

impl ContentIngest {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        lookup: Arc<dyn AnswerLookup>,
        cache: Arc<AnswerCache>,
        snapshot_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            lookup,
            cache,
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// 拉取并缓存一份课件，返回解析出的题目数
    pub async fn store(&self, content_id: &str) -> AppResult<usize> {
        // 课件 id 直接拼进快照文件名
        if !is_safe_name(content_id) {
            return Err(FileError::UnsafeName {
                name: content_id.to_string(),
            }
            .into());
        }

        let raw = self.fetcher.fetch_presentation(content_id).await?;

        let snapshot = self.snapshot_dir.join(format!("{}.json", content_id));
        tokio::fs::write(&snapshot, &raw)
            .await
            .map_err(|e| FileError::write_failed(snapshot.display().to_string(), e))?;
        debug!("课件快照已保存: {}", snapshot.display());

        let mut unit =
            ContentUnit::from_snapshot(content_id, &raw).map_err(|source| {
                FileError::JsonParseFailed {
                    path: snapshot.display().to_string(),
                    source,
                }
            })?;

        for question in unit.questions.iter_mut().filter(|q| q.answers.is_empty()) {
            match self.lookup.lookup_answer(&question.problem_id).await {
                Some(answer) => {
                    info!("📖 题目 {} 使用补充答案: {}", question.problem_id, answer);
                    question.answers = answer;
                }
                None => warn!(
                    "⚠️ 题目 {} ({}) 没有答案，提交内容将为空",
                    question.problem_id, question.problem_type
                ),
            }
        }

        self.cache.put(content_id, &unit).await?;
        Ok(unit.questions.len())
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
