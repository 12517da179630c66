//! 会话驱动器 - 编排层
//!
//! 把事件处理流程放进独立任务运行，自己只盯着结束时间：
//! - 流程读到 `lessonfinished` → 正常下课
//! - 到达结束时间 → 中止流程任务
//! - 长连接彻底断开 → 返回错误

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use tracing::{info, warn};

use crate::config::now_cst;
use crate::error::SessionError;
use crate::workflow::EventFlow;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// 会话结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// 收到下课事件
    LessonFinished,
    /// 到达配置的结束时间
    DeadlineReached,
}

/// 会话驱动器
pub struct SessionDriver {
    flow: EventFlow,
    deadline: DateTime<FixedOffset>,
    poll_interval: Duration,
}

impl SessionDriver {
    /// 轮询间隔最小 1 毫秒
    pub fn new(flow: EventFlow, deadline: DateTime<FixedOffset>, poll_interval: Duration) -> Self {
        Self {
            flow,
            deadline,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// 运行直到下课、到点或连接彻底失败
    pub async fn run(self) -> Result<SessionOutcome, SessionError> {
        let Self {
            mut flow,
            deadline,
            poll_interval,
        } = self;

        let mut task = tokio::spawn(async move { flow.run().await });
        let mut ticker = tokio::time::interval(poll_interval);

        loop {
            tokio::select! {
                joined = &mut task => {
                    joined??;
                    info!("🔔 课堂已结束");
                    return Ok(SessionOutcome::LessonFinished);
                }
                _ = ticker.tick() => {
                    if now_cst() >= deadline {
                        warn!("⏰ 已到结束时间 {}，停止监听", deadline.format("%Y-%m-%d %H:%M"));
                        task.abort();
                        return Ok(SessionOutcome::DeadlineReached);
                    }
                }
            }
        }
    }
}
