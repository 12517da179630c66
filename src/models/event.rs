//! 长连接消息模型
//!
//! 入站消息在边界处按 `op` 一次性解析为 [`ServerEvent`]，
//! 出站控制消息统一由 [`ClientMessage`] 序列化。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::de;
use crate::models::session::Session;

/// 服务端推送的事件
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServerEvent {
    /// 握手应答，携带当前放映状态（重连后会再次出现）
    Hello(Announce),
    /// 时间线请求的应答
    FetchTimeline(Announce),
    /// 开始放映课件
    ShowPresentation(PresentationRef),
    /// 老师上传了新课件
    PresentationCreated(PresentationRef),
    /// 课件被修改
    PresentationUpdated(PresentationRef),
    /// 翻页
    SlideNav(SlideNav),
    /// 题目解锁
    UnlockProblem(ProblemNotice),
    /// 题目详情
    ProblemInfo(ProblemInfo),
    /// 答题时间延长
    ExtendTime(ProblemNotice),
    /// 题目结束作答
    ProblemFinished(ProblemFinished),
    /// 随机点名
    CallPaused(Notice),
    /// 课件放映结束
    ShowFinished(PresentationRef),
    /// 下课
    LessonFinished(Notice),
    /// 未识别的 op
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// 解析一条原始文本消息
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// 事件名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Hello(_) => "hello",
            ServerEvent::FetchTimeline(_) => "fetchtimeline",
            ServerEvent::ShowPresentation(_) => "showpresentation",
            ServerEvent::PresentationCreated(_) => "presentationcreated",
            ServerEvent::PresentationUpdated(_) => "presentationupdated",
            ServerEvent::SlideNav(_) => "slidenav",
            ServerEvent::UnlockProblem(_) => "unlockproblem",
            ServerEvent::ProblemInfo(_) => "probleminfo",
            ServerEvent::ExtendTime(_) => "extendtime",
            ServerEvent::ProblemFinished(_) => "problemfinished",
            ServerEvent::CallPaused(_) => "callpaused",
            ServerEvent::ShowFinished(_) => "showfinished",
            ServerEvent::LessonFinished(_) => "lessonfinished",
            ServerEvent::Unknown => "unknown",
        }
    }
}

/// 放映状态通告（hello / fetchtimeline）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Announce {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub presentation: Option<String>,
    #[serde(default, deserialize_with = "de::null_as_default")]
    pub timeline: Vec<TimelineEntry>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub unlockedproblem: Vec<String>,
}

impl Announce {
    /// 当前课件 ID
    ///
    /// 没有 `presentation` 字段时，时间线超过 3 条则取倒数第二条的 `pres`
    pub fn content_id(&self) -> Option<&str> {
        if let Some(id) = self.presentation.as_deref() {
            return Some(id);
        }
        let len = self.timeline.len();
        if len > 3 {
            self.timeline[len - 2].pres.as_deref()
        } else {
            None
        }
    }
}

/// 时间线条目，只关心所属课件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TimelineEntry {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub pres: Option<String>,
}

/// 只携带课件 ID 的事件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PresentationRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub presentation: Option<String>,
}

/// 翻页事件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlideNav {
    #[serde(default)]
    pub slide: Option<SlideRef>,
    #[serde(default, deserialize_with = "de::id_list")]
    pub unlockedproblem: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlideRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub pres: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub sid: Option<String>,
}

/// 携带题目记录的事件（unlockproblem / extendtime）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProblemNotice {
    #[serde(default)]
    pub problem: Option<ProblemRef>,
}

impl ProblemNotice {
    pub fn problem_id(&self) -> Option<&str> {
        self.problem.as_ref().and_then(|p| p.prob.as_deref())
    }

    pub fn content_id(&self) -> Option<&str> {
        self.problem.as_ref().and_then(|p| p.pres.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProblemRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub prob: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub pres: Option<String>,
    /// 延长的秒数
    #[serde(default)]
    pub extend: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProblemInfo {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub problemid: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProblemFinished {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub prob: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub pres: Option<String>,
}

/// 只带提示标题的事件
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub event: Option<NoticeBody>,
}

impl Notice {
    pub fn title(&self) -> Option<&str> {
        self.event.as_ref().and_then(|e| e.title.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NoticeBody {
    #[serde(default)]
    pub title: Option<String>,
}

/// 客户端发出的控制消息
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ClientMessage {
    /// 握手
    Hello {
        userid: JsonValue,
        role: String,
        auth: String,
        lessonid: String,
    },
    /// 请求当前时间线
    FetchTimeline { lessonid: String, msgid: u32 },
    /// 请求题目详情
    ProblemInfo {
        lessonid: String,
        problemid: String,
        msgid: u32,
    },
}

impl ClientMessage {
    /// 握手消息；userid 是数字时按数字发送
    pub fn hello(session: &Session) -> Self {
        let userid = session
            .identity_id
            .parse::<u64>()
            .map(JsonValue::from)
            .unwrap_or_else(|_| JsonValue::from(session.identity_id.clone()));
        ClientMessage::Hello {
            userid,
            role: "student".to_string(),
            auth: session.lesson_token.clone(),
            lessonid: session.lesson_id.clone(),
        }
    }

    pub fn fetch_timeline(lesson_id: &str) -> Self {
        ClientMessage::FetchTimeline {
            lessonid: lesson_id.to_string(),
            msgid: 1,
        }
    }

    pub fn problem_info(lesson_id: &str, problem_id: &str) -> Self {
        ClientMessage::ProblemInfo {
            lessonid: lesson_id.to_string(),
            problemid: problem_id.to_string(),
            msgid: 1,
        }
    }

    /// 序列化为文本帧
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
