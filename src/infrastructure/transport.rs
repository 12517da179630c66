//! 长连接传输层 - 基础设施层
//!
//! 只暴露"收发文本帧"的能力，不认识任何课堂消息

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{ConnectError, ReadError, SendError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 可以反复打开的传输（重连时再次调用 `open`）
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Channel>, ConnectError>;
}

/// 一条已打开的全双工文本通道
#[async_trait]
pub trait Channel: Send {
    async fn send_text(&mut self, text: String) -> Result<(), SendError>;

    /// 阻塞直到收到下一条文本消息；连接断开时返回错误
    async fn recv_text(&mut self) -> Result<String, ReadError>;
}

/// WebSocket 传输
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<Box<dyn Channel>, ConnectError> {
        debug!("正在建立 WebSocket 连接: {}", self.url);
        let (stream, response) =
            connect_async(self.url.as_str())
                .await
                .map_err(|e| ConnectError::Dial {
                    url: self.url.clone(),
                    source: Box::new(e),
                })?;
        debug!("WebSocket 连接成功，状态码: {}", response.status());
        Ok(Box::new(WsChannel { stream }))
    }
}

struct WsChannel {
    stream: WsStream,
}

#[async_trait]
impl Channel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), SendError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| match e {
                WsError::ConnectionClosed | WsError::AlreadyClosed => SendError::Closed,
                other => SendError::Transport(Box::new(other)),
            })
    }

    async fn recv_text(&mut self) -> Result<String, ReadError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    debug!("服务端关闭连接: {:?}", frame);
                    return Err(ReadError::Closed);
                }
                // ping/pong 由 tungstenite 自动应答，二进制帧不属于本协议
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ReadError::Transport(Box::new(e))),
                None => return Err(ReadError::Closed),
            }
        }
    }
}
