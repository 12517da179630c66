//! 答题调度器 - 业务能力层
//!
//! 每次调用都派生一个独立任务：查题 → （随机延迟）→ 提交。
//! 不去重、不取消，失败只记日志。

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::clients::{AnswerSubmission, AnswerSubmitter};
use crate::services::AnswerCache;
use crate::utils::logging::truncate_text;

/// 提交方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// 随机等待若干秒再提交
    Jittered,
    /// 立即提交（延时后补交）
    Immediate,
}

/// 随机延迟区间（秒，闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    min: u64,
    max: u64,
}

impl DelayRange {
    /// 上下界写反时自动交换
    pub fn new(min: u64, max: u64) -> Self {
        if min > max {
            warn!(
                "⚠️ 答题延迟配置上下界写反 (min={}, max={})，已自动交换",
                min, max
            );
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.random_range(self.min..=self.max))
    }

    pub fn draw(&self) -> Duration {
        self.draw_with(&mut rand::rng())
    }
}

/// 答题调度器
#[derive(Clone)]
pub struct SubmissionScheduler {
    cache: Arc<AnswerCache>,
    submitter: Arc<dyn AnswerSubmitter>,
    delay: DelayRange,
}

impl SubmissionScheduler {
    pub fn new(
        cache: Arc<AnswerCache>,
        submitter: Arc<dyn AnswerSubmitter>,
        delay: DelayRange,
    ) -> Self {
        Self {
            cache,
            submitter,
            delay,
        }
    }

    /// 派生一个答题任务
    pub fn submit(&self, question_id: &str, mode: SubmitMode) -> JoinHandle<()> {
        let this = self.clone();
        let question_id = question_id.to_string();
        tokio::spawn(async move { this.answer(&question_id, mode).await })
    }

    async fn answer(&self, question_id: &str, mode: SubmitMode) {
        let question = match self.cache.get(question_id).await {
            Ok(Some(question)) => question,
            Ok(None) => {
                debug!("题库中没有题目 {}，跳过", question_id);
                return;
            }
            Err(e) => {
                error!("❌ 读取题库失败，题目 {}: {}", question_id, e);
                return;
            }
        };

        info!("📝 题目 {}: {}", question_id, truncate_text(&question.prompt, 60));
        info!("   答案: {}", question.answer_preview());

        if mode == SubmitMode::Jittered {
            let wait = self.delay.draw();
            info!("⏳ 题目 {} 将在 {} 秒后提交", question_id, wait.as_secs());
            tokio::time::sleep(wait).await;
        }

        let submission = AnswerSubmission {
            problem_id: question.problem_id.clone(),
            problem_type: question.problem_type.code(),
            dt: chrono::Utc::now().timestamp_millis(),
            result: vec![question.answers.clone()],
        };

        match self.submitter.submit_answer(&submission).await {
            Ok(response) if response.is_ok() => {
                info!("✅ 题目 {} 提交成功", question_id);
            }
            Ok(response) => {
                error!(
                    "❌ 题目 {} 提交失败: code={} msg={}",
                    question_id, response.code, response.msg
                );
            }
            Err(e) => {
                error!("❌ 题目 {} 提交失败: {}", question_id, e);
            }
        }
    }
}
