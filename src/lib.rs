//! 网络输入缓冲控制
//!
//! - `core`: 基础类型、错误、配置、播放时钟
//! - `control`: 根据下游队列占用暂停 / 恢复播放的缓冲控制器
//! - `input`: 各类输入源以及环形缓冲预取

pub mod core;
pub mod control;
pub mod input;

pub use crate::control::{BufferController, PipelineHandles};
pub use crate::core::{NetBufConfig, NetBufError, Result};
pub use crate::input::{SourceFactory, StreamSource};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AudioPauseFlag, LogOsdNotifier, QueueCounters};
    use crate::core::{BufferConfig, PlaybackClock, RingConfig};
    use std::net::UdpSocket;
    use std::sync::Arc;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// UDP 流经过环形缓冲读出，读取路径驱动时钟暂停 / 恢复
    #[test]
    fn test_udp_stream_drives_clock() -> anyhow::Result<()> {
        init_logger();

        let clock = Arc::new(PlaybackClock::new());
        let audio = Arc::new(AudioPauseFlag::new());
        let queues = Arc::new(QueueCounters::new());
        let handles = PipelineHandles::new(clock.clone(), audio.clone(), queues.clone(), Arc::new(LogOsdNotifier));

        let mut config = NetBufConfig {
            buffer: BufferConfig {
                notice_delay_ms: 0,
                ..BufferConfig::default()
            },
            ring: RingConfig {
                capacity: 64 * 1024,
                read_timeout_ms: 100,
            },
            ..NetBufConfig::default()
        };
        config.input.preview_size = 0;

        let mut source = SourceFactory::open("udp://127.0.0.1:0", &config, Some(handles))?;
        assert!(source.buffer_controller().is_some());

        // 还没有数据：读超时返回 0，下游队列为空，进入缓冲
        let mut buf = [0u8; 188];
        assert_eq!(source.read(&mut buf)?, 0);
        assert!(clock.is_paused());
        assert!(audio.is_paused());
        assert_eq!(source.stats().starvations, 1);

        queues.set(6, 0);
        source.read(&mut buf)?;
        assert!(!clock.is_paused());
        assert!(!audio.is_paused());
        let controller = source.buffer_controller().unwrap();
        assert_eq!(controller.high_water_mark(), 15);
        assert_eq!(controller.episodes(), 1);

        source.dispose();
        assert!(clock.is_adjustable());
        Ok(())
    }

    /// RTP 负载经过接收线程和环形缓冲到达读取端
    #[test]
    fn test_rtp_payload_reaches_reader() -> anyhow::Result<()> {
        init_logger();

        let mut config = NetBufConfig::default();
        config.ring.read_timeout_ms = 500;
        config.input.preview_size = 4;

        let locator = crate::core::Locator::parse("rtp://127.0.0.1:0")?;
        let sender = UdpSocket::bind("127.0.0.1:0")?;

        // open 在预览读取上等待一次读超时，预览为空
        let mut source = crate::input::RtpSource::open(&locator, &config, None)?;
        assert!(source.preview().is_empty());

        let mut packet = vec![0x80, 96, 0, 1, 0, 0, 0, 0, 0, 0, 0, 1];
        packet.extend_from_slice(b"transport stream");
        sender.send_to(&packet, source.local_addr())?;

        let mut buf = [0u8; 16];
        assert_eq!(source.read(&mut buf)?, 16);
        assert_eq!(&buf, b"transport stream");
        source.dispose();
        Ok(())
    }
}
