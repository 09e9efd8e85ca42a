// 输入层：各类输入源、预览缓冲、环形缓冲和数据块池

pub mod ring_buffer;
pub mod preview;
pub mod pool;
pub mod stats;
pub mod source;
pub mod file;
pub mod pipe;
pub mod tcp;
pub mod http;
pub mod rtp;
pub mod factory;

pub use ring_buffer::RingBuffer;
pub use preview::PreviewBuffer;
pub use pool::{BlockPool, PooledBlock};
pub use stats::InputStats;
pub use source::StreamSource;
pub use file::FileSource;
pub use pipe::PipeSource;
pub use tcp::TcpSource;
pub use http::{HttpSource, ResponseHead};
pub use rtp::{rtp_payload, RtpHeader, RtpSource};
pub use factory::{SourceCreationResult, SourceFactory};
