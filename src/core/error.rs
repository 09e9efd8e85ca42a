use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetBufError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("无效的地址: {0}")]
    InvalidLocator(String),

    #[error("不支持的协议: {0}")]
    UnsupportedScheme(String),

    #[error("无法解析主机: {0}")]
    Resolve(String),

    #[error("连接失败: {0}")]
    Connect(String),

    #[error("HTTP 错误: {status} {reason}")]
    Http { status: u16, reason: String },

    #[error("HTTP 重定向被拒绝: {status} -> {location}")]
    HttpRedirect { status: u16, location: String },

    #[error("协议错误: {0}")]
    Protocol(String),

    #[error("输入源不支持该 seek 操作")]
    NotSeekable,

    #[error("无效配置: {0}")]
    InvalidConfig(String),

    #[error("配置解析错误: {0}")]
    Config(#[from] serde_json::Error),

    #[error("输入源已关闭")]
    Closed,
}

/// 判断 IO 错误是否可以重试
pub fn is_transient_io(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::Interrupted || is_timeout_io(err)
}

/// 读超时（socket 超时在 Unix 上报告为 WouldBlock，在 Windows 上为 TimedOut）
pub fn is_timeout_io(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

pub type Result<T> = std::result::Result<T, NetBufError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_io(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_transient_io(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient_io(&io::Error::from(io::ErrorKind::ConnectionReset)));

        assert!(is_timeout_io(&io::Error::from(io::ErrorKind::TimedOut)));
        assert!(!is_timeout_io(&io::Error::from(io::ErrorKind::Interrupted)));
    }
}
