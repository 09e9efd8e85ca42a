use crate::control::BufferController;
use crate::core::{InputCapabilities, InputConfig, NetBufError, Result, SeekOrigin, SourceState, StreamLength};
use crate::input::preview::PreviewBuffer;
use crate::input::source::{read_full, seek_forward_only, SourceCommon, StreamSource};
use crate::input::stats::InputStats;
use log::{debug, info, warn};
use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

/// 解析并连接 host:port，依次尝试每个地址
pub(crate) fn connect(host: &str, port: u16, config: &InputConfig) -> Result<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| NetBufError::Resolve(format!("{}: {}", host, e)))?
        .collect();
    if addrs.is_empty() {
        return Err(NetBufError::Resolve(host.to_string()));
    }

    let mut last_error = None;
    for addr in addrs {
        debug!("🔌 尝试连接 {}", addr);
        match TcpStream::connect_timeout(&addr, config.connect_timeout()) {
            Ok(stream) => {
                stream.set_read_timeout(Some(config.io_timeout()))?;
                stream.set_nodelay(true)?;
                info!("✅ 已连接 {}", addr);
                return Ok(stream);
            }
            Err(e) => {
                warn!("⚠️ 连接 {} 失败: {}", addr, e);
                last_error = Some(e);
            }
        }
    }

    Err(NetBufError::Connect(format!(
        "{}:{} ({})",
        host,
        port,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// 原始 TCP 输入
pub struct TcpSource {
    stream: Option<TcpStream>,
    peer: String,
    common: SourceCommon,
}

impl TcpSource {
    pub fn open(
        host: &str,
        port: u16,
        config: &InputConfig,
        controller: Option<BufferController>,
    ) -> Result<Self> {
        info!("🌐 打开 TCP 输入: {}:{}", host, port);
        let mut common = SourceCommon::new(controller);
        let mut stream = connect(host, port, config)?;

        let preview = PreviewBuffer::fill(config.preview_size, |buf| stream.read(buf))?;
        common.streaming(preview);

        Ok(Self {
            stream: Some(stream),
            peer: format!("{}:{}", host, port),
            common,
        })
    }
}

impl StreamSource for TcpSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(NetBufError::Closed)?;
        self.common.read_with(buf, |rest, on_stall| read_full(stream, rest, on_stall))
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        seek_forward_only(self, offset, origin)
    }

    fn length(&self) -> StreamLength {
        StreamLength::Unknown
    }

    fn position(&self) -> u64 {
        self.common.position
    }

    fn capabilities(&self) -> InputCapabilities {
        InputCapabilities::PREVIEW | InputCapabilities::BLOCK | InputCapabilities::LIVE
    }

    fn preview(&self) -> &[u8] {
        self.common.preview.peek()
    }

    fn state(&self) -> SourceState {
        self.common.state
    }

    fn stats(&self) -> &InputStats {
        &self.common.stats
    }

    fn buffer_controller(&self) -> Option<&BufferController> {
        self.common.controller.as_ref()
    }

    fn dispose(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            info!("🔌 断开 TCP 连接: {}", self.peer);
        }
        self.common.dispose();
    }

    fn description(&self) -> String {
        format!("tcp://{}", self.peer)
    }
}

impl Drop for TcpSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{AudioPauseFlag, NullOsdNotifier, PipelineHandles, QueueCounters};
    use crate::core::{BufferConfig, PlaybackClock};
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reads_until_peer_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"hello over tcp").unwrap();
        });

        let config = InputConfig {
            preview_size: 5,
            ..InputConfig::default()
        };
        let mut source = TcpSource::open("127.0.0.1", port, &config, None).unwrap();
        assert_eq!(source.preview(), b"hello");

        let mut buf = [0u8; 32];
        let n = source.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello over tcp");
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        server.join().unwrap();
    }

    #[test]
    fn test_stalled_peer_pauses_clock_during_read() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (resume_tx, resume_rx) = crossbeam_channel::bounded::<()>(1);
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"abcd").unwrap();
            resume_rx.recv().unwrap();
            conn.write_all(b"efgh").unwrap();
        });

        let clock = Arc::new(PlaybackClock::new());
        let queues = Arc::new(QueueCounters::new());
        let handles = PipelineHandles::new(
            clock.clone(),
            Arc::new(AudioPauseFlag::new()),
            queues.clone(),
            Arc::new(NullOsdNotifier),
        );
        let controller = BufferController::new(
            handles,
            BufferConfig {
                notice_delay_ms: 0,
                ..BufferConfig::default()
            },
        );
        let config = InputConfig {
            preview_size: 4,
            io_timeout_ms: 50,
            ..InputConfig::default()
        };
        let mut source = TcpSource::open("127.0.0.1", port, &config, Some(controller)).unwrap();

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 8];
            let n = source.read(&mut buf).unwrap();
            (buf, n, source.stats().starvations)
        });

        // 对端断流期间读取仍在阻塞，但缓冲控制已经暂停了时钟
        thread::sleep(Duration::from_millis(400));
        assert!(!reader.is_finished());
        assert!(clock.is_paused());
        assert!(!clock.is_adjustable());

        resume_tx.send(()).unwrap();
        let (buf, n, starvations) = reader.join().unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf, b"abcdefgh");
        assert!(starvations >= 1);
        server.join().unwrap();
    }

    #[test]
    fn test_open_with_short_preview_returns() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let server = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            conn.write_all(b"ab").unwrap();
            done_rx.recv().unwrap();
        });

        let config = InputConfig {
            io_timeout_ms: 50,
            ..InputConfig::default()
        };
        let source = TcpSource::open("127.0.0.1", port, &config, None).unwrap();
        assert_eq!(source.preview(), b"ab");
        done_tx.send(()).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // 绑定后立即释放，得到一个大概率没有监听者的端口
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let result = TcpSource::open("127.0.0.1", port, &InputConfig::default(), None);
        assert!(matches!(result, Err(NetBufError::Connect(_))));
    }
}
