use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 建立长连接失败
    #[error("连接错误: {0}")]
    Connect(#[from] ConnectError),
    /// 课堂会话异常结束
    #[error("会话异常: {0}")]
    Session(#[from] SessionError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 建立连接 / 握手失败
#[derive(Debug, Error)]
pub enum ConnectError {
    /// 拨号失败
    #[error("无法连接到 {url}: {source}")]
    Dial {
        url: String,
        #[source]
        source: BoxError,
    },
    /// 握手消息发送失败
    #[error("握手消息发送失败: {0}")]
    Handshake(#[source] SendError),
    /// 握手消息编码失败
    #[error("握手消息编码失败: {0}")]
    Encode(#[source] serde_json::Error),
    /// 连接超时
    #[error("连接超时 ({secs}秒)")]
    Timeout { secs: u64 },
}

/// 发送消息失败
#[derive(Debug, Error)]
pub enum SendError {
    /// 连接已关闭
    #[error("连接已关闭")]
    Closed,
    /// 消息编码失败
    #[error("消息编码失败: {0}")]
    Encode(#[source] serde_json::Error),
    /// 底层传输错误
    #[error("传输错误: {0}")]
    Transport(#[source] BoxError),
}

/// 读取消息失败（连接断开）
#[derive(Debug, Error)]
pub enum ReadError {
    /// 服务端关闭了连接
    #[error("连接已关闭")]
    Closed,
    /// 底层传输错误
    #[error("传输错误: {0}")]
    Transport(#[source] BoxError),
}

/// 读取失败后唯一一次重连也失败
#[derive(Debug, Error)]
#[error("读取失败 ({read})，重连失败: {reconnect}")]
pub struct FatalConnectionError {
    pub read: ReadError,
    #[source]
    pub reconnect: ConnectError,
}

/// 会话驱动器的异常结束原因
#[derive(Debug, Error)]
pub enum SessionError {
    /// 长连接断开且重连失败
    #[error("连接已中断: {0}")]
    Connection(#[from] FatalConnectionError),
    /// 事件处理任务崩溃
    #[error("事件处理任务异常退出: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP 状态码非 2xx
    #[error("API返回状态码 {status} ({endpoint}): {body}")]
    BadStatus {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 业务返回码错误
    #[error("API返回错误响应 ({endpoint}): code={code:?}, msg={msg:?}")]
    BadResponse {
        endpoint: String,
        code: Option<i64>,
        msg: Option<String>,
    },
    /// 响应中缺少字段
    #[error("API响应缺少字段 {field} ({endpoint})")]
    MissingField { endpoint: String, field: String },
    /// JSON 解析失败
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// JSON 解析失败
    #[error("JSON解析失败 ({path}): {source}")]
    JsonParseFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 不能用作文件名的标识
    #[error("非法文件名: '{name}' (只允许字母、数字、'_' 和 '-')")]
    UnsafeName { name: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 时间格式错误
    #[error("{field} 时间格式错误: '{value}' (应为 2024-09-01T08:00)")]
    TimeParseFailed {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置项取值不合法
    #[error("配置项 {field} 的值 '{value}' 不合法: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    /// 默认配置序列化失败
    #[error("默认配置序列化失败: {0}")]
    Serialize(#[source] toml::ser::Error),
    /// sessionId 已过期
    #[error("sessionId 已过期，请登录网页版后更新配置文件中的 session_id")]
    SessionExpired,
}

// ========== 便捷构造函数 ==========

impl ApiError {
    /// 创建网络请求失败错误
    pub fn request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// 创建 JSON 解析失败错误
    pub fn json_failed(endpoint: impl Into<String>, source: serde_json::Error) -> Self {
        ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source,
        }
    }
}

impl FileError {
    /// 创建文件读取错误
    pub fn read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::ReadFailed {
            path: path.into(),
            source,
        }
    }

    /// 创建文件写入错误
    pub fn write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        FileError::WriteFailed {
            path: path.into(),
            source,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_error_keeps_both_causes() {
        let err = FatalConnectionError {
            read: ReadError::Closed,
            reconnect: ConnectError::Timeout { secs: 10 },
        };
        let text = err.to_string();
        assert!(text.contains("连接已关闭"));
        assert!(text.contains("10秒"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_app_error_from_config_error() {
        let err: AppError = ConfigError::SessionExpired.into();
        assert!(matches!(err, AppError::Config(ConfigError::SessionExpired)));
        assert!(err.to_string().starts_with("配置错误"));
    }
}
