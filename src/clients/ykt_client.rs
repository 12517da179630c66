/// 课堂平台 API 客户端
///
/// 封装所有与平台 HTTP 接口相关的调用逻辑
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::clients::{AnswerSubmission, AnswerSubmitter, ContentFetcher, SubmitResponse};
use crate::config::Config;
use crate::error::ApiError;

const SESSION_CHECK: &str = "/api/v3/classroom/on-lesson-upcoming-exam";
const COURSE_LIST: &str = "/v2/api/web/courses/list";
const CHECKIN: &str = "/api/v3/lesson/checkin";
const PRESENTATION_FETCH: &str = "/api/v3/lesson/presentation/fetch";
const PROBLEM_ANSWER: &str = "/api/v3/lesson/problem/answer";
const CLASSROOM_LIST: &str = "/api/v3/classroom/drop-down";
const LESSON_ADD: &str = "/api/v3/lesson/add";
const CHOICE_DETAIL: &str = "/api/v3/lesson/problem/choice-detail";
const LESSON_END: &str = "/api/v3/lesson/end";

/// 采样授课的标题
const SAMPLING_TITLE: &str = "答案采样授课";

/// 课程列表中的一项
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: String,
    pub name: String,
}

/// 签到结果
#[derive(Debug, Clone, PartialEq)]
pub struct Checkin {
    /// 长连接握手用
    pub lesson_token: String,
    pub identity_id: String,
    /// 响应头 Set-Auth，后续接口的 Bearer token
    pub auth: String,
}

/// 平台 API 客户端
#[derive(Clone)]
pub struct YktClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
    auth: Option<String>,
}

impl YktClient {
    /// 创建新的平台客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session_id: config.session_id.clone(),
            auth: None,
        }
    }

    /// 带上签到拿到的 Bearer token
    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    /// 检查 sessionId 是否仍然有效
    pub async fn check_session(&self) -> Result<bool, ApiError> {
        let body = self.get_json(SESSION_CHECK, &[]).await?;
        Ok(is_ok_body(&body))
    }

    /// 获取账号下的全部课程
    pub async fn list_courses(&self) -> Result<Vec<Course>, ApiError> {
        let body = self.get_json(COURSE_LIST, &[("identity", "2")]).await?;
        let courses = body
            .pointer("/data/list")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|item| {
                        let course = item.get("course")?;
                        Some(Course {
                            id: value_to_string(course.get("id")?)?,
                            name: course
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(courses)
    }

    /// 查找指定课程正在进行的课堂
    ///
    /// 该课程当前没有在上课时返回 `None`
    pub async fn find_lesson_id(&self, course_id: &str) -> Result<Option<String>, ApiError> {
        let body = self.get_json(SESSION_CHECK, &[]).await?;
        let lesson_id = body
            .pointer("/data/onLessonClassrooms")
            .and_then(Value::as_array)
            .and_then(|lessons| {
                lessons.iter().find_map(|lesson| {
                    let matches = lesson
                        .get("courseId")
                        .and_then(value_to_string)
                        .is_some_and(|id| id == course_id);
                    if matches {
                        lesson.get("lessonId").and_then(value_to_string)
                    } else {
                        None
                    }
                })
            });
        Ok(lesson_id)
    }

    /// 课堂签到，换取长连接凭证
    pub async fn checkin(&self, lesson_id: &str) -> Result<Checkin, ApiError> {
        let request = self
            .http
            .post(self.url(CHECKIN))
            .header("Cookie", self.cookie())
            .json(&json!({ "source": 1, "lessonId": lesson_id }));
        let response = send(request, CHECKIN).await?;

        let auth = response
            .headers()
            .get("Set-Auth")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = read_json(response, CHECKIN).await?;

        let code = body.get("code").and_then(Value::as_i64);
        if code.is_some_and(|c| c != 0) {
            return Err(ApiError::BadResponse {
                endpoint: CHECKIN.to_string(),
                code,
                msg: body.get("msg").and_then(Value::as_str).map(str::to_string),
            });
        }

        let field = |name: &str| {
            body.pointer(&format!("/data/{}", name))
                .and_then(value_to_string)
                .ok_or_else(|| ApiError::MissingField {
                    endpoint: CHECKIN.to_string(),
                    field: format!("data.{}", name),
                })
        };

        Ok(Checkin {
            lesson_token: field("lessonToken")?,
            identity_id: field("identityId")?,
            auth,
        })
    }

    // ========== 教师身份 ==========

    /// 查找自己管理的班级
    ///
    /// 指定课程名时按名称匹配，否则取第一门 `teacherManage` 的课程
    pub async fn find_teaching_classroom(
        &self,
        course_name: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let body = self.get_json(CLASSROOM_LIST, &[]).await?;
        let courses = body
            .pointer("/data/courses")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let classroom = courses
            .iter()
            .filter(|course| match course_name {
                Some(name) => course.get("courseName").and_then(Value::as_str) == Some(name),
                None => course.get("teacherManage").and_then(Value::as_bool) == Some(true),
            })
            .find_map(|course| {
                course
                    .get("classrooms")?
                    .as_array()?
                    .first()?
                    .get("classroomId")
                    .and_then(value_to_string)
            });
        Ok(classroom)
    }

    /// 在班级里开一节采样课，返回该课的 token（响应头 Set-Auth）
    pub async fn open_sampling_lesson(&self, classroom_id: &str) -> Result<String, ApiError> {
        let request = self.authorized(self.http.post(self.url(LESSON_ADD)).json(&json!({
            "classroomId": classroom_id,
            "title": SAMPLING_TITLE,
            "chapterId": null,
            "sectionId": null,
        })));
        let response = send(request, LESSON_ADD).await?;

        response
            .headers()
            .get("Set-Auth")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::MissingField {
                endpoint: LESSON_ADD.to_string(),
                field: "Set-Auth".to_string(),
            })
    }

    /// 以授课身份查询题目的正确答案（`data.display`）
    pub async fn choice_detail(
        &self,
        lesson_token: &str,
        problem_id: &str,
    ) -> Result<Option<String>, ApiError> {
        let request = self
            .http
            .get(self.url(CHOICE_DETAIL))
            .query(&[("problem_id", problem_id)])
            .header("Cookie", self.cookie())
            .header("Authorization", format!("Bearer {}", lesson_token));
        let response = send(request, CHOICE_DETAIL).await?;
        let body = read_json(response, CHOICE_DETAIL).await?;

        Ok(body
            .pointer("/data/display")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
    }

    /// 结束采样课
    pub async fn end_lesson(&self, lesson_token: &str) -> Result<(), ApiError> {
        let request = self
            .http
            .post(self.url(LESSON_END))
            .header("Cookie", self.cookie())
            .header("Authorization", format!("Bearer {}", lesson_token));
        send(request, LESSON_END).await?;
        Ok(())
    }

    // ========== 请求辅助 ==========

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn cookie(&self) -> String {
        format!("sessionid={}", self.session_id)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Cookie", self.cookie());
        match &self.auth {
            Some(auth) => request.header("Authorization", format!("Bearer {}", auth)),
            None => request,
        }
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let request = self.authorized(self.http.get(self.url(path)).query(query));
        let response = send(request, path).await?;
        read_json(response, path).await
    }
}

#[async_trait]
impl ContentFetcher for YktClient {
    async fn fetch_presentation(&self, content_id: &str) -> Result<String, ApiError> {
        let request = self.authorized(
            self.http
                .get(self.url(PRESENTATION_FETCH))
                .query(&[("presentation_id", content_id)]),
        );
        let response = send(request, PRESENTATION_FETCH).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(PRESENTATION_FETCH, e))?;
        debug!("课件 {} 响应体长度: {}", content_id, body.len());
        Ok(body)
    }
}

#[async_trait]
impl AnswerSubmitter for YktClient {
    async fn submit_answer(
        &self,
        submission: &AnswerSubmission,
    ) -> Result<SubmitResponse, ApiError> {
        let request = self.authorized(self.http.post(self.url(PROBLEM_ANSWER)).json(submission));
        let response = send(request, PROBLEM_ANSWER).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::request_failed(PROBLEM_ANSWER, e))?;
        serde_json::from_str(&body).map_err(|e| ApiError::json_failed(PROBLEM_ANSWER, e))
    }
}

/// 发送请求；非 2xx 视为错误
async fn send(request: RequestBuilder, endpoint: &str) -> Result<Response, ApiError> {
    let response = request
        .send()
        .await
        .map_err(|e| ApiError::request_failed(endpoint, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::BadStatus {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

async fn read_json(response: Response, endpoint: &str) -> Result<Value, ApiError> {
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::request_failed(endpoint, e))?;
    serde_json::from_str(&text).map_err(|e| ApiError::json_failed(endpoint, e))
}

/// 检查平台响应是否为 `{code: 0, msg: "OK"}`
fn is_ok_body(body: &Value) -> bool {
    body.get("code").and_then(Value::as_i64) == Some(0)
        && body.get("msg").and_then(Value::as_str) == Some("OK")
}

/// ID 字段可能是字符串也可能是数字
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
