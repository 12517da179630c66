//! 外部协作方
//!
//! 核心流程只依赖这里的 trait，具体实现是平台 HTTP 客户端和本地答案文件

pub mod answer_book;
pub mod teacher_lookup;
pub mod ykt_client;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub use answer_book::AnswerBook;
pub use teacher_lookup::TeacherAnswerLookup;
pub use ykt_client::{Checkin, Course, YktClient};

/// 按课件 ID 获取课件快照（原始响应体）
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_presentation(&self, content_id: &str) -> Result<String, ApiError>;
}

/// 提交答案
#[async_trait]
pub trait AnswerSubmitter: Send + Sync {
    async fn submit_answer(&self, submission: &AnswerSubmission) -> Result<SubmitResponse, ApiError>;
}

/// 课件中没有答案时的补充来源
#[async_trait]
pub trait AnswerLookup: Send + Sync {
    async fn lookup_answer(&self, problem_id: &str) -> Option<String>;
}

/// 按顺序尝试多个答案来源，取第一个非空答案
pub struct AnswerSources {
    sources: Vec<Arc<dyn AnswerLookup>>,
}

impl AnswerSources {
    pub fn new(sources: Vec<Arc<dyn AnswerLookup>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl AnswerLookup for AnswerSources {
    async fn lookup_answer(&self, problem_id: &str) -> Option<String> {
        for source in &self.sources {
            if let Some(answer) = source.lookup_answer(problem_id).await {
                return Some(answer);
            }
        }
        None
    }
}

/// 提交答案的请求体
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub problem_id: String,
    pub problem_type: i64,
    /// 毫秒时间戳
    pub dt: i64,
    pub result: Vec<String>,
}

/// 提交答案的响应
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubmitResponse {
    #[serde(default = "unknown_code")]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
}

fn unknown_code() -> i64 {
    -1
}

impl SubmitResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0 && self.msg == "OK"
    }
}
