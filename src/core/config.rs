use crate::core::error::{NetBufError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 缓冲控制参数
///
/// 单位为加权占用量：视频队列长度 + audio_weight × 音频队列长度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// 低于该值进入缓冲
    pub low_water_mark: usize,
    /// 高于该值恢复播放
    pub high_water_mark: usize,
    /// 每次新进入缓冲时高水位的增量
    pub step: usize,
    /// 高水位上限
    pub ceiling: usize,
    /// 音频队列权重
    pub audio_weight: usize,
    /// 显示 "缓冲中" 提示后、冻结时钟前的等待（毫秒）
    pub notice_delay_ms: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            low_water_mark: 2,
            high_water_mark: 5,
            step: 10,
            ceiling: 150,
            audio_weight: 8,
            notice_delay_ms: 1000,
        }
    }
}

impl BufferConfig {
    pub fn notice_delay(&self) -> Duration {
        Duration::from_millis(self.notice_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.low_water_mark >= self.high_water_mark {
            return Err(NetBufError::InvalidConfig(format!(
                "low_water_mark ({}) 必须小于 high_water_mark ({})",
                self.low_water_mark, self.high_water_mark
            )));
        }
        if self.high_water_mark > self.ceiling {
            return Err(NetBufError::InvalidConfig(format!(
                "high_water_mark ({}) 超过上限 ({})",
                self.high_water_mark, self.ceiling
            )));
        }
        if self.audio_weight == 0 {
            return Err(NetBufError::InvalidConfig("audio_weight 不能为 0".to_string()));
        }
        Ok(())
    }
}

/// 环形缓冲参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// 容量（字节）
    pub capacity: usize,
    /// 读取等待超时（毫秒）
    pub read_timeout_ms: u64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: 1024 * 1024,
            read_timeout_ms: 5000,
        }
    }
}

impl RingConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// 输入适配器参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// 预览缓冲大小（字节）
    pub preview_size: usize,
    pub connect_timeout_ms: u64,
    /// 单次 IO 超时，超时视为瞬时错误重试
    pub io_timeout_ms: u64,
    /// UDP 单个数据报最大长度
    pub datagram_size: usize,
    /// read_block 块大小
    pub block_size: usize,
    pub user_agent: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            preview_size: 4096,
            connect_timeout_ms: 10_000,
            io_timeout_ms: 30_000,
            datagram_size: 65_536,
            block_size: 8192,
            user_agent: format!("myy_netbuf/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl InputConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// 总配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetBufConfig {
    pub buffer: BufferConfig,
    pub ring: RingConfig,
    pub input: InputConfig,
}

impl NetBufConfig {
    /// 从 JSON 字符串加载（缺省字段使用默认值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: NetBufConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 JSON 文件加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.buffer.validate()?;
        if self.ring.capacity == 0 {
            return Err(NetBufError::InvalidConfig("ring.capacity 不能为 0".to_string()));
        }
        if self.input.datagram_size == 0 || self.input.block_size == 0 {
            return Err(NetBufError::InvalidConfig(
                "datagram_size / block_size 不能为 0".to_string(),
            ));
        }
        Ok(())
    }
}
