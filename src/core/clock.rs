use crate::control::Clock;
use crate::core::ClockSpeed;
use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// 播放时钟 - 用于音视频同步
///
/// 缓冲控制通过 `Clock` trait 暂停 / 恢复时钟，并在缓冲期间禁止外部校准
#[derive(Clone)]
pub struct PlaybackClock {
    inner: Arc<Mutex<ClockInner>>,
}

struct ClockInner {
    base_pts: i64,              // 基准 PTS（毫秒）
    base_instant: Instant,      // 基准时刻
    playback_rate: f64,         // 播放速率（1.0 = 正常）
    paused: bool,
    paused_at: i64,             // 暂停时的位置
    adjustable: bool,           // 是否允许外部（音频硬件）校准
}

impl ClockInner {
    fn now(&self) -> i64 {
        if self.paused {
            self.paused_at
        } else {
            let elapsed = self.base_instant.elapsed().as_millis() as i64;
            self.base_pts + (elapsed as f64 * self.playback_rate) as i64
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ClockInner {
                base_pts: 0,
                base_instant: Instant::now(),
                playback_rate: 1.0,
                paused: false,
                paused_at: 0,
                adjustable: true,
            })),
        }
    }

    /// 获取当前播放时间（毫秒）
    pub fn now(&self) -> i64 {
        self.inner.lock().now()
    }

    /// 设置播放位置
    pub fn set_time(&self, pts: i64) {
        let mut inner = self.inner.lock();
        inner.base_pts = pts;
        inner.base_instant = Instant::now();
        inner.paused_at = pts;
    }

    /// 外部校准（例如音频输出报告的实际位置）
    ///
    /// 时钟不可校准时忽略，返回是否生效
    pub fn adjust(&self, pts: i64) -> bool {
        let mut inner = self.inner.lock();
        if !inner.adjustable {
            debug!("⏱ 时钟不可校准，忽略 adjust({})", pts);
            return false;
        }
        inner.base_pts = pts;
        inner.base_instant = Instant::now();
        inner.paused_at = pts;
        true
    }

    /// 设置播放速率
    pub fn set_rate(&self, rate: f64) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            let current_time = inner.now();
            inner.base_pts = current_time;
            inner.base_instant = Instant::now();
        }
        inner.playback_rate = rate;
    }

    /// 当前速度
    pub fn speed(&self) -> ClockSpeed {
        if self.inner.lock().paused {
            ClockSpeed::Pause
        } else {
            ClockSpeed::Normal
        }
    }

    /// 是否暂停
    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn is_adjustable(&self) -> bool {
        self.inner.lock().adjustable
    }
}

impl Clock for PlaybackClock {
    fn set_speed(&self, speed: ClockSpeed) {
        let mut inner = self.inner.lock();
        match speed {
            ClockSpeed::Pause => {
                if !inner.paused {
                    inner.paused_at = inner.now();
                    inner.paused = true;
                }
            }
            ClockSpeed::Normal => {
                if inner.paused {
                    inner.base_pts = inner.paused_at;
                    inner.base_instant = Instant::now();
                    inner.paused = false;
                }
            }
        }
    }

    fn set_adjustable(&self, adjustable: bool) {
        self.inner.lock().adjustable = adjustable;
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_pause_freezes_time() {
        let clock = PlaybackClock::new();
        clock.set_time(1_000);
        clock.set_speed(ClockSpeed::Pause);
        let frozen = clock.now();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.now(), frozen);
        assert_eq!(clock.speed(), ClockSpeed::Pause);

        clock.set_speed(ClockSpeed::Normal);
        thread::sleep(Duration::from_millis(20));
        assert!(clock.now() > frozen);
    }

    #[test]
    fn test_adjust_respects_adjustable() {
        let clock = PlaybackClock::new();
        clock.set_speed(ClockSpeed::Pause);
        clock.set_adjustable(false);
        assert!(!clock.adjust(5_000));
        assert!(clock.now() < 5_000);

        clock.set_adjustable(true);
        assert!(clock.adjust(5_000));
        assert_eq!(clock.now(), 5_000);
    }
}
