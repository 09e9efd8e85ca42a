use crate::control::PipelineHandles;
use crate::core::{BufferConfig, BufferStatus, ClockSpeed};
use log::{debug, info};
use std::thread;

/// 一次 check() 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    Unchanged,
    /// 新进入缓冲：时钟已暂停
    Started,
    /// 缓冲结束：时钟已恢复
    Resumed,
}

/// 网络缓冲控制器
///
/// 每个流一个实例，由输入源独占。输入源每读取一个单元就调用一次 `check()`：
/// - 加权占用量低于低水位时暂停时钟、开始缓冲，并把高水位调高一个步长
///   （网络抖动越频繁，容忍的缓冲延迟越大）
/// - 缓冲中占用量超过高水位时恢复时钟
///
/// 本轮缓冲的恢复阈值是进入缓冲时生效的高水位，调高后的高水位从下一轮开始生效
pub struct BufferController {
    handles: PipelineHandles,
    config: BufferConfig,
    buffering: bool,
    low_water_mark: usize,
    high_water_mark: usize,
    /// 当前这一轮缓冲的恢复阈值
    resume_mark: usize,
    episodes: u64,
    released: bool,
}

impl BufferController {
    /// 创建缓冲控制器，此时不会改动时钟
    pub fn new(handles: PipelineHandles, config: BufferConfig) -> Self {
        let low_water_mark = config.low_water_mark;
        let high_water_mark = config.high_water_mark.max(low_water_mark.saturating_add(1));
        let config = BufferConfig {
            high_water_mark,
            ceiling: config.ceiling.max(high_water_mark),
            audio_weight: config.audio_weight.max(1),
            ..config
        };

        debug!(
            "🧮 创建缓冲控制器: low={} high={} step={} ceiling={}",
            low_water_mark, high_water_mark, config.step, config.ceiling
        );

        Self {
            handles,
            config,
            buffering: false,
            low_water_mark,
            high_water_mark,
            resume_mark: high_water_mark,
            episodes: 0,
            released: false,
        }
    }

    /// 使用默认参数创建
    pub fn with_defaults(handles: PipelineHandles) -> Self {
        Self::new(handles, BufferConfig::default())
    }

    /// 检查下游队列并在需要时切换缓冲状态
    ///
    /// 可以任意频繁地调用；除了新进入缓冲时的一次提示等待外不会阻塞
    pub fn check(&mut self) -> BufferEvent {
        let occupancy = self.occupancy();

        if occupancy < self.low_water_mark {
            if self.buffering {
                return BufferEvent::Unchanged;
            }
            self.start_buffering(occupancy);
            BufferEvent::Started
        } else if occupancy > self.resume_mark && self.buffering {
            self.stop_buffering(occupancy);
            BufferEvent::Resumed
        } else {
            BufferEvent::Unchanged
        }
    }

    fn start_buffering(&mut self, occupancy: usize) {
        self.handles.osd.show_buffering_notice();

        // 等提示真正显示出来再冻结时钟
        let delay = self.config.notice_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.resume_mark = self.high_water_mark;
        if self.high_water_mark < self.config.ceiling {
            self.high_water_mark = self.high_water_mark.saturating_add(self.config.step).min(self.config.ceiling);
        }

        self.handles.clock.set_speed(ClockSpeed::Pause);
        self.handles.clock.set_adjustable(false);
        self.handles.audio_sink.set_paused(true);
        self.buffering = true;
        self.episodes += 1;

        info!(
            "🔄 开始缓冲（占用: {} < 低水位 {}），第 {} 次，高水位调整为 {}",
            occupancy, self.low_water_mark, self.episodes, self.high_water_mark
        );
    }

    fn stop_buffering(&mut self, occupancy: usize) {
        self.handles.clock.set_speed(ClockSpeed::Normal);
        self.handles.clock.set_adjustable(true);
        self.handles.audio_sink.set_paused(false);
        self.buffering = false;
        self.handles.osd.hide_buffering_notice();

        info!("✅ 缓冲完成（占用: {} > {}），恢复播放", occupancy, self.resume_mark);
    }

    /// 加权占用量：视频队列 + 权重 × 音频队列
    pub fn occupancy(&self) -> usize {
        let video = self.handles.queues.video_queue_depth();
        let audio = self.handles.queues.audio_queue_depth();
        video.saturating_add(audio.saturating_mul(self.config.audio_weight))
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn low_water_mark(&self) -> usize {
        self.low_water_mark
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// 当前（或最近一轮）缓冲的恢复阈值
    pub fn resume_mark(&self) -> usize {
        self.resume_mark
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn status(&self) -> BufferStatus {
        let video_depth = self.handles.queues.video_queue_depth();
        let audio_depth = self.handles.queues.audio_queue_depth();
        BufferStatus {
            occupancy: video_depth.saturating_add(audio_depth.saturating_mul(self.config.audio_weight)),
            video_depth,
            audio_depth,
            is_buffering: self.buffering,
            low_water_mark: self.low_water_mark,
            high_water_mark: self.high_water_mark,
            episodes: self.episodes,
        }
    }

    /// 释放控制器，恢复时钟的可校准状态
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // 从未进入缓冲就没有改过时钟；时钟是共享的，可能正被别的流暂停
        if self.episodes == 0 {
            return;
        }
        self.handles.clock.set_adjustable(true);
        debug!(
            "🧹 释放缓冲控制器（buffering={}，共缓冲 {} 次）",
            self.buffering, self.episodes
        );
    }
}

impl Drop for BufferController {
    fn drop(&mut self) {
        self.release();
    }
}
