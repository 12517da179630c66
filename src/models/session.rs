//! 课堂会话标识
//!
//! 一次连接期间不可变；重连时原样复用，不重新登录

use std::fmt::Display;

/// 课堂会话
#[derive(Debug, Clone)]
pub struct Session {
    /// 登录凭证（cookie: sessionid）
    pub session_id: String,
    /// 课堂 ID
    pub lesson_id: String,
    /// 学生身份 ID（identityId）
    pub identity_id: String,
    /// 长连接握手用的 lessonToken
    pub lesson_token: String,
    /// HTTP 接口用的 Bearer token（签到响应头 Set-Auth）
    pub auth: String,
}

impl Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[课堂 {} 用户 {}]", self.lesson_id, self.identity_id)
    }
}
