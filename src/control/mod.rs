// 缓冲控制：根据下游队列占用暂停 / 恢复播放时钟

pub mod collaborators;
pub mod probe;
pub mod buffer_control;

pub use collaborators::{
    AudioPauseFlag, AudioSink, Clock, LogOsdNotifier, NullOsdNotifier, OsdNotifier,
    PipelineHandles, QueueProbe,
};
pub use probe::{ChannelQueueProbe, QueueCounters};
pub use buffer_control::{BufferController, BufferEvent};
