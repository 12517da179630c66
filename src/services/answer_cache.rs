//! 题库缓存 - 业务能力层
//!
//! 只负责"读写题库文件"能力：
//! - 每个题目 ID 最多一条记录，后写覆盖先写，不合并
//! - 同一把异步锁串行化读取和读改写
//! - 整体写入临时文件后 rename，避免写到一半的题库

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{AppResult, FileError};
use crate::models::{ContentUnit, Question};

/// 题库缓存
pub struct AnswerCache {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AnswerCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// 用一份课件的题目替换题库中该课件的旧记录
    ///
    /// 新课件重新声明的题目 ID 即使挂在别的课件下也会被替换；
    /// 同一份课件里重复的题目 ID 只保留最后一条
    pub async fn put(&self, content_id: &str, unit: &ContentUnit) -> AppResult<()> {
        let incoming = last_per_problem(&unit.questions);

        let _guard = self.lock.lock().await;

        let mut records = read_bank(&self.path).await?;
        let before = records.len();
        records.retain(|q| {
            q.content_id != content_id && !incoming.iter().any(|n| n.problem_id == q.problem_id)
        });
        let dropped = before - records.len();
        let added = incoming.len();
        records.extend(incoming);

        write_bank(&self.path, &records).await?;
        info!(
            "✓ 课件 {} 已写入题库: 新增 {} 题，替换 {} 条旧记录",
            content_id,
            added,
            dropped
        );
        Ok(())
    }

    /// 按题目 ID 查找
    pub async fn get(&self, question_id: &str) -> AppResult<Option<Question>> {
        let _guard = self.lock.lock().await;
        let records = read_bank(&self.path).await?;
        Ok(records.into_iter().find(|q| q.problem_id == question_id))
    }
}

async fn read_bank(path: &Path) -> AppResult<Vec<Question>> {
    let path_str = path.display().to_string();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("题库文件不存在，视为空: {}", path_str);
            return Ok(Vec::new());
        }
        Err(e) => return Err(FileError::read_failed(path_str, e).into()),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records = serde_json::from_str(&content)
        .map_err(|source| FileError::JsonParseFailed { path: path_str, source })?;
    Ok(records)
}

async fn write_bank(path: &Path, records: &[Question]) -> AppResult<()> {
    let path_str = path.display().to_string();

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records
        .serialize(&mut ser)
        .map_err(|source| FileError::JsonParseFailed {
            path: path_str.clone(),
            source,
        })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &buf)
        .await
        .map_err(|e| FileError::write_failed(tmp.display().to_string(), e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| FileError::write_failed(path_str, e))?;
    Ok(())
}

fn last_per_problem(questions: &[Question]) -> Vec<Question> {
    let mut unique: Vec<Question> = Vec::with_capacity(questions.len());
    for question in questions {
        unique.retain(|q| q.problem_id != question.problem_id);
        unique.push(question.clone());
    }
    unique
}
