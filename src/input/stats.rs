use log::debug;
use std::time::{Duration, Instant};

/// 输入统计信息
#[derive(Debug, Clone, Default)]
pub struct InputStats {
    /// 接收字节数
    pub bytes_received: u64,
    /// 当前带宽（字节/秒）
    pub current_bandwidth: f64,
    /// 成功读取次数
    pub reads: u64,
    /// 读取超时 / 数据不足次数
    pub starvations: u64,
    /// 丢弃的畸形数据包（RTP）
    pub dropped_packets: u64,
    /// 连接持续时间
    pub connection_duration: Duration,
    connection_start: Option<Instant>,
}

impl InputStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接建立时调用
    pub fn start(&mut self) {
        self.connection_start = Some(Instant::now());
    }

    /// 更新网络统计
    pub fn update(&mut self, bytes_received: usize) {
        self.bytes_received += bytes_received as u64;
        self.reads += 1;

        // 计算带宽
        if let Some(start) = self.connection_start {
            self.connection_duration = start.elapsed();
            let duration = self.connection_duration.as_secs_f64();
            if duration > 0.0 {
                self.current_bandwidth = self.bytes_received as f64 / duration;
            }
        }

        if self.reads % 1000 == 0 {
            debug!(
                "📊 输入统计 - 接收: {} bytes, 带宽: {:.2} KB/s",
                self.bytes_received,
                self.current_bandwidth / 1024.0
            );
        }
    }

    pub fn record_starvation(&mut self) {
        self.starvations += 1;
    }
}
