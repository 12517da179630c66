/// 以教师身份向平台查询正确答案
///
/// 账号同时管理着某个班级时，可以在该班级开一节临时课，
/// 用授课 token 读取题目的答案分布（`display` 即正确选项），读完立即下课。
use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::clients::{AnswerLookup, YktClient};
use crate::error::ApiError;

pub struct TeacherAnswerLookup {
    client: YktClient,
    course_name: Option<String>,
}

impl TeacherAnswerLookup {
    /// `course_name` 为空时使用第一门自己管理的课程
    pub fn new(client: YktClient, course_name: &str) -> Self {
        let course_name = Some(course_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            client,
            course_name,
        }
    }

    async fn query(&self, problem_id: &str) -> Result<Option<String>, ApiError> {
        let Some(classroom_id) = self
            .client
            .find_teaching_classroom(self.course_name.as_deref())
            .await?
        else {
            debug!("没有可用于查询答案的教师班级");
            return Ok(None);
        };

        let token = self.client.open_sampling_lesson(&classroom_id).await?;
        let answer = self.client.choice_detail(&token, problem_id).await;

        // 无论查询是否成功都要下课，避免残留授课
        if let Err(e) = self.client.end_lesson(&token).await {
            warn!("⚠️ 结束采样课失败 (班级 {}): {}", classroom_id, e);
        }
        answer
    }
}

#[async_trait]
impl AnswerLookup for TeacherAnswerLookup {
    async fn lookup_answer(&self, problem_id: &str) -> Option<String> {
        match self.query(problem_id).await {
            Ok(Some(answer)) => {
                info!("✓ 教师身份查到题目 {} 的答案: {}", problem_id, answer);
                Some(answer)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("⚠️ 教师身份查询题目 {} 答案失败: {}", problem_id, e);
                None
            }
        }
    }
}
