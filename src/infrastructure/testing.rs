//! 测试用的脚本化传输

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ConnectError, ReadError, SendError};
use crate::infrastructure::transport::{Channel, Transport};

/// 一条通道上依次发生的事情
pub(crate) enum Step {
    /// 收到一条文本
    Text(String),
    /// 连接断开
    Drop,
}

pub(crate) fn text(raw: impl Into<String>) -> Step {
    Step::Text(raw.into())
}

/// 每次 `open` 取出一份脚本；脚本为 `None` 表示这次连接失败
pub(crate) struct ScriptedTransport {
    scripts: Mutex<VecDeque<Option<Vec<Step>>>>,
    opens: AtomicUsize,
    sent: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ScriptedTransport {
    pub(crate) fn new(scripts: Vec<Option<Vec<Step>>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            opens: AtomicUsize::new(0),
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// 已打开的连接数
    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// 所有发出的消息（连接序号, 文本）
    pub(crate) fn sent(&self) -> Vec<(usize, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, ConnectError> {
        let script = self.scripts.lock().unwrap().pop_front().flatten();
        match script {
            Some(steps) => {
                let index = self.opens.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedChannel {
                    index,
                    steps: steps.into(),
                    sent: self.sent.clone(),
                }))
            }
            None => Err(ConnectError::Dial {
                url: "scripted://".to_string(),
                source: "refused".into(),
            }),
        }
    }
}

struct ScriptedChannel {
    index: usize,
    steps: VecDeque<Step>,
    sent: Arc<Mutex<Vec<(usize, String)>>>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        self.sent.lock().unwrap().push((self.index, text));
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, ReadError> {
        match self.steps.pop_front() {
            Some(Step::Text(raw)) => Ok(raw),
            Some(Step::Drop) => Err(ReadError::Closed),
            // 脚本读完后保持连接但不再有消息
            None => std::future::pending().await,
        }
    }
}
