use crate::core::error::{NetBufError, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 时钟速度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSpeed {
    /// 暂停（速度为 0）
    Pause,
    /// 正常速度
    Normal,
}

/// 输入源长度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLength {
    Known(u64),
    /// 直播 / 分块传输等无法得知长度的情况
    Unknown,
}

impl StreamLength {
    pub fn known(self) -> Option<u64> {
        match self {
            StreamLength::Known(len) => Some(len),
            StreamLength::Unknown => None,
        }
    }
}

/// Seek 起点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

bitflags! {
    /// 输入源能力
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputCapabilities: u32 {
        /// 支持任意 seek
        const SEEKABLE = 0x0001;
        /// 打开时已填充预览缓冲
        const PREVIEW = 0x0002;
        /// 支持按块读取
        const BLOCK = 0x0004;
        /// 实时源（网络无法暂停）
        const LIVE = 0x0008;
    }
}

/// 输入源状态
///
/// 缓冲暂停不属于输入源状态，而属于 BufferController
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Closed,
    Opening,
    Streaming,
}

/// 输入协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    Stdin,
    Fifo,
    Tcp,
    Http,
    Rtp,
    Udp,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::File => "file",
            Scheme::Stdin => "stdin",
            Scheme::Fifo => "fifo",
            Scheme::Tcp => "tcp",
            Scheme::Http => "http",
            Scheme::Rtp => "rtp",
            Scheme::Udp => "udp",
        }
    }

    /// 是否容易出现卡顿（需要缓冲控制）
    pub fn needs_buffer_control(&self) -> bool {
        !matches!(self, Scheme::File)
    }
}

/// 带协议前缀的输入地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub scheme: Scheme,
    /// 协议前缀之后的部分（路径、host:port 等）
    pub target: String,
    /// 原始字符串
    pub raw: String,
}

impl Locator {
    /// 从地址字符串解析
    pub fn parse(locator: &str) -> Result<Self> {
        let raw = locator.trim();
        if raw.is_empty() {
            return Err(NetBufError::InvalidLocator("空地址".to_string()));
        }

        if raw == "-" {
            return Ok(Self::new(Scheme::Stdin, "", raw));
        }

        let Some((prefix, rest)) = raw.split_once("://") else {
            // 默认当作本地文件
            return Ok(Self::new(Scheme::File, raw, raw));
        };

        let scheme = match prefix.to_ascii_lowercase().as_str() {
            "file" => Scheme::File,
            "stdin" => Scheme::Stdin,
            "fifo" => Scheme::Fifo,
            "tcp" => Scheme::Tcp,
            "http" => Scheme::Http,
            "rtp" => Scheme::Rtp,
            "udp" => Scheme::Udp,
            other => return Err(NetBufError::UnsupportedScheme(other.to_string())),
        };

        let needs_target = !matches!(scheme, Scheme::Stdin);
        if needs_target && rest.is_empty() {
            return Err(NetBufError::InvalidLocator(raw.to_string()));
        }

        Ok(Self::new(scheme, rest, raw))
    }

    fn new(scheme: Scheme, target: &str, raw: &str) -> Self {
        Self {
            scheme,
            target: target.to_string(),
            raw: raw.to_string(),
        }
    }

    /// 文件 / FIFO 路径
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.target)
    }

    /// 拆分 host:port（支持 [v6]:port）
    pub fn host_port(&self) -> Result<(String, u16)> {
        let target = self.target.trim_end_matches('/');
        let (host, port) = target
            .rsplit_once(':')
            .ok_or_else(|| NetBufError::InvalidLocator(format!("缺少端口: {}", self.raw)))?;
        let port: u16 = port
            .parse()
            .map_err(|_| NetBufError::InvalidLocator(format!("无效端口: {}", self.raw)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Ok((host.to_string(), port))
    }
}

/// 缓冲状态信息（用于监控和调试）
#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferStatus {
    /// 加权占用量
    pub occupancy: usize,
    /// 视频队列长度
    pub video_depth: usize,
    /// 音频队列长度
    pub audio_depth: usize,
    /// 是否正在缓冲
    pub is_buffering: bool,
    pub low_water_mark: usize,
    pub high_water_mark: usize,
    /// 已进入缓冲的次数
    pub episodes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schemes() {
        assert_eq!(Locator::parse("/tmp/a.ts").unwrap().scheme, Scheme::File);
        assert_eq!(Locator::parse("file:///tmp/a.ts").unwrap().target, "/tmp/a.ts");
        assert_eq!(Locator::parse("-").unwrap().scheme, Scheme::Stdin);
        assert_eq!(Locator::parse("stdin://").unwrap().scheme, Scheme::Stdin);
        assert_eq!(Locator::parse("HTTP://example.com/a").unwrap().scheme, Scheme::Http);
        assert_eq!(Locator::parse("rtp://239.0.0.1:5004").unwrap().scheme, Scheme::Rtp);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            Locator::parse("rtsp://cam/live"),
            Err(NetBufError::UnsupportedScheme(_))
        ));
        assert!(matches!(Locator::parse("tcp://"), Err(NetBufError::InvalidLocator(_))));
        assert!(Locator::parse("   ").is_err());
    }

    #[test]
    fn test_host_port() {
        let loc = Locator::parse("udp://239.1.2.3:1234").unwrap();
        assert_eq!(loc.host_port().unwrap(), ("239.1.2.3".to_string(), 1234));
        let loc = Locator::parse("tcp://[::1]:9000").unwrap();
        assert_eq!(loc.host_port().unwrap(), ("::1".to_string(), 9000));
        assert!(Locator::parse("tcp://host").unwrap().host_port().is_err());
    }

    #[test]
    fn test_buffer_control_schemes() {
        assert!(!Scheme::File.needs_buffer_control());
        assert!(Scheme::Http.needs_buffer_control());
        assert!(Scheme::Fifo.needs_buffer_control());
    }
}
