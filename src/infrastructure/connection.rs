//! 长连接管理器 - 基础设施层
//!
//! 唯一持有长连接的模块：
//! - 建立连接后立即发送握手，不等待应答
//! - 读取失败时立刻重连一次并重发完全相同的握手
//! - 重连失败即为致命错误，不做无限重试或退避

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::{ConnectError, FatalConnectionError, SendError};
use crate::infrastructure::transport::{Channel, Transport};
use crate::models::{ClientMessage, Session};

/// 长连接管理器
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    handshake: String,
    connect_timeout: Duration,
    channel: Box<dyn Channel>,
    reconnects: usize,
}

impl ConnectionManager {
    /// 打开连接并发送握手
    pub async fn connect(
        transport: Arc<dyn Transport>,
        session: &Session,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let handshake = ClientMessage::hello(session)
            .to_text()
            .map_err(ConnectError::Encode)?;

        let channel = open_and_greet(transport.as_ref(), &handshake, connect_timeout).await?;
        info!("{} ✓ 长连接已建立", session);

        Ok(Self {
            transport,
            handshake,
            connect_timeout,
            channel,
            reconnects: 0,
        })
    }

    /// 发送一条控制消息
    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), SendError> {
        let text = message.to_text().map_err(SendError::Encode)?;
        debug!("发送消息: {}", text);
        self.channel.send_text(text).await
    }

    /// 读取下一条消息
    ///
    /// 连接断开时透明地重连一次；重连失败返回致命错误
    pub async fn read_next(&mut self) -> Result<String, FatalConnectionError> {
        loop {
            match self.channel.recv_text().await {
                Ok(text) => return Ok(text),
                Err(read) => {
                    warn!("⚠️ 消息读取错误: {}，正在重新连接...", read);
                    match open_and_greet(
                        self.transport.as_ref(),
                        &self.handshake,
                        self.connect_timeout,
                    )
                    .await
                    {
                        Ok(channel) => {
                            self.channel = channel;
                            self.reconnects += 1;
                            info!("✓ 重新连接成功 (第 {} 次)", self.reconnects);
                        }
                        Err(reconnect) => {
                            error!("❌ 重新连接失败: {}", reconnect);
                            return Err(FatalConnectionError { read, reconnect });
                        }
                    }
                }
            }
        }
    }

    /// 累计重连次数
    pub fn reconnects(&self) -> usize {
        self.reconnects
    }
}

async fn open_and_greet(
    transport: &dyn Transport,
    handshake: &str,
    connect_timeout: Duration,
) -> Result<Box<dyn Channel>, ConnectError> {
    let attempt = async {
        let mut channel = transport.open().await?;
        channel
            .send_text(handshake.to_string())
            .await
            .map_err(ConnectError::Handshake)?;
        Ok::<_, ConnectError>(channel)
    };

    tokio::time::timeout(connect_timeout, attempt)
        .await
        .map_err(|_| ConnectError::Timeout {
            secs: connect_timeout.as_secs(),
        })?
}
