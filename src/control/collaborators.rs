use crate::core::ClockSpeed;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 播放时钟接口
///
/// 时钟由多个流共享，实现方需自行保证线程安全
pub trait Clock: Send + Sync {
    fn set_speed(&self, speed: ClockSpeed);

    /// 是否允许外部（音频硬件等）校准时钟
    fn set_adjustable(&self, adjustable: bool);
}

/// 音频输出接口
pub trait AudioSink: Send + Sync {
    fn set_paused(&self, paused: bool);
}

/// 下游队列长度探针（单位为帧 / 包个数，而非字节）
pub trait QueueProbe: Send + Sync {
    fn video_queue_depth(&self) -> usize;
    fn audio_queue_depth(&self) -> usize;
}

/// 屏幕提示接口，没有显示表面时可以什么都不做
pub trait OsdNotifier: Send + Sync {
    fn show_buffering_notice(&self);
    fn hide_buffering_notice(&self);
}

/// 缓冲控制依赖的外部对象
///
/// 创建 BufferController 时显式传入，不经过任何全局状态
#[derive(Clone)]
pub struct PipelineHandles {
    pub clock: Arc<dyn Clock>,
    pub audio_sink: Arc<dyn AudioSink>,
    pub queues: Arc<dyn QueueProbe>,
    pub osd: Arc<dyn OsdNotifier>,
}

impl PipelineHandles {
    pub fn new(
        clock: Arc<dyn Clock>,
        audio_sink: Arc<dyn AudioSink>,
        queues: Arc<dyn QueueProbe>,
        osd: Arc<dyn OsdNotifier>,
    ) -> Self {
        Self {
            clock,
            audio_sink,
            queues,
            osd,
        }
    }
}

/// 音频暂停标志，音频输出线程轮询
#[derive(Debug, Default)]
pub struct AudioPauseFlag {
    paused: AtomicBool,
}

impl AudioPauseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

impl AudioSink for AudioPauseFlag {
    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

/// 把缓冲提示写入日志
#[derive(Debug, Default)]
pub struct LogOsdNotifier;

impl OsdNotifier for LogOsdNotifier {
    fn show_buffering_notice(&self) {
        info!("🔄 缓冲中...");
    }

    fn hide_buffering_notice(&self) {
        info!("✅ 缓冲结束");
    }
}

#[derive(Debug, Default)]
pub struct NullOsdNotifier;

impl OsdNotifier for NullOsdNotifier {
    fn show_buffering_notice(&self) {}

    fn hide_buffering_notice(&self) {}
}
