//! 基础设施层：持有稀缺资源（长连接），只暴露能力

pub mod connection;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::ConnectionManager;
pub use transport::{Channel, Transport, WsTransport};
