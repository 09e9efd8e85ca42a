use crate::control::QueueProbe;
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 由解码管线维护的队列计数
#[derive(Debug, Default)]
pub struct QueueCounters {
    video: AtomicUsize,
    audio: AtomicUsize,
}

impl QueueCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, video: usize, audio: usize) {
        self.video.store(video, Ordering::Release);
        self.audio.store(audio, Ordering::Release);
    }

    pub fn push_video(&self) {
        self.video.fetch_add(1, Ordering::AcqRel);
    }

    pub fn push_audio(&self) {
        self.audio.fetch_add(1, Ordering::AcqRel);
    }

    /// 出队，已经为 0 时保持 0
    pub fn pop_video(&self) {
        let _ = self
            .video
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn pop_audio(&self) {
        let _ = self
            .audio
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}

impl QueueProbe for QueueCounters {
    fn video_queue_depth(&self) -> usize {
        self.video.load(Ordering::Acquire)
    }

    fn audio_queue_depth(&self) -> usize {
        self.audio.load(Ordering::Acquire)
    }
}

/// 直接读取 demux 线程的有界包通道长度
pub struct ChannelQueueProbe<V, A> {
    video: Receiver<V>,
    audio: Receiver<A>,
}

impl<V, A> ChannelQueueProbe<V, A> {
    pub fn new(video: Receiver<V>, audio: Receiver<A>) -> Self {
        Self { video, audio }
    }
}

impl<V: Send, A: Send> QueueProbe for ChannelQueueProbe<V, A> {
    fn video_queue_depth(&self) -> usize {
        self.video.len()
    }

    fn audio_queue_depth(&self) -> usize {
        self.audio.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_counters_never_underflow() {
        let counters = QueueCounters::new();
        counters.pop_video();
        counters.push_video();
        counters.push_audio();
        counters.push_audio();
        counters.pop_audio();
        assert_eq!(counters.video_queue_depth(), 1);
        assert_eq!(counters.audio_queue_depth(), 1);
        counters.pop_video();
        counters.pop_video();
        assert_eq!(counters.video_queue_depth(), 0);
    }

    #[test]
    fn test_channel_probe() {
        let (vtx, vrx) = bounded::<u32>(8);
        let (atx, arx) = bounded::<u32>(8);
        let probe = ChannelQueueProbe::new(vrx, arx);
        vtx.send(1).unwrap();
        vtx.send(2).unwrap();
        atx.send(3).unwrap();
        assert_eq!(probe.video_queue_depth(), 2);
        assert_eq!(probe.audio_queue_depth(), 1);
    }
}
