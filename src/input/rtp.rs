use crate::control::BufferController;
use crate::core::{
    is_transient_io, InputCapabilities, Locator, NetBufConfig, NetBufError, Result, Scheme, SeekOrigin,
    SourceState, StreamLength,
};
use crate::input::preview::PreviewBuffer;
use crate::input::ring_buffer::RingBuffer;
use crate::input::source::{seek_forward_only, SourceCommon, StreamSource};
use crate::input::stats::InputStats;
use log::{debug, error, info, warn};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 接收超时，保证停止标志能被及时看到
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn log_ctx() -> String {
    format!("[pid:{} tid:{:?}]", process::id(), thread::current().id())
}

/// RTP 固定头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP 版本（应为 2）
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub const FIXED_LEN: usize = 12;

    /// 解析固定 12 字节头，数据不足时返回 None
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < Self::FIXED_LEN {
            return None;
        }

        let first_byte = data[0];
        let second_byte = data[1];

        Some(Self {
            version: (first_byte >> 6) & 0x03,
            padding: (first_byte >> 5) & 0x01 == 1,
            extension: (first_byte >> 4) & 0x01 == 1,
            csrc_count: first_byte & 0x0F,
            marker: (second_byte >> 7) & 0x01 == 1,
            payload_type: second_byte & 0x7F,
            sequence_number: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        })
    }
}

/// 去掉 RTP 头（CSRC 列表、扩展头、填充），返回负载
///
/// 畸形数据包返回 None
pub fn rtp_payload(packet: &[u8]) -> Option<&[u8]> {
    let header = RtpHeader::parse(packet)?;
    if header.version != 2 {
        return None;
    }

    let mut offset = RtpHeader::FIXED_LEN + 4 * header.csrc_count as usize;
    if packet.len() < offset {
        return None;
    }

    if header.extension {
        if packet.len() < offset + 4 {
            return None;
        }
        let words = u16::from_be_bytes([packet[offset + 2], packet[offset + 3]]) as usize;
        offset += 4 + 4 * words;
        if packet.len() < offset {
            return None;
        }
    }

    let mut end = packet.len();
    if header.padding {
        let pad = packet[end - 1] as usize;
        if pad == 0 || offset + pad > end {
            return None;
        }
        end -= pad;
    }

    Some(&packet[offset..end])
}

/// 接收线程的计数（跨线程共享）
#[derive(Debug, Default)]
struct ProducerCounters {
    datagrams: AtomicU64,
    dropped: AtomicU64,
}

/// 后台接收线程
struct ReceiverThread {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

/// RTP / UDP 输入
///
/// 后台线程不停接收数据报写入环形缓冲（网络无法暂停），
/// 管线读取路径从环形缓冲中读取，读空时最多等待 `ring.read_timeout`
pub struct RtpSource {
    ring: Arc<RingBuffer>,
    receiver: Option<ReceiverThread>,
    counters: Arc<ProducerCounters>,
    local_addr: SocketAddr,
    locator: String,
    common: SourceCommon,
}

impl RtpSource {
    /// `rtp://` 去掉 RTP 头，`udp://` 直接使用数据报内容
    pub fn open(
        locator: &Locator,
        config: &NetBufConfig,
        controller: Option<BufferController>,
    ) -> Result<Self> {
        config.validate()?;
        let strip_rtp = match locator.scheme {
            Scheme::Rtp => true,
            Scheme::Udp => false,
            other => return Err(NetBufError::UnsupportedScheme(other.as_str().to_string())),
        };
        let (host, port) = locator.host_port()?;

        info!("{} 🌐 打开 {} 输入: {}", log_ctx(), locator.scheme.as_str(), locator.raw);
        let mut common = SourceCommon::new(controller);

        let socket = bind_socket(&host, port)?;
        socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;

        let ring = Arc::new(RingBuffer::new(config.ring.capacity, config.ring.read_timeout()));
        let counters = Arc::new(ProducerCounters::default());
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let ring = ring.clone();
            let counters = counters.clone();
            let stop = stop.clone();
            let datagram_size = config.input.datagram_size;
            thread::Builder::new()
                .name(format!("{}-recv", locator.scheme.as_str()))
                .spawn(move || receive_loop(socket, ring, counters, stop, strip_rtp, datagram_size))?
        };

        // 预览数据来自环形缓冲，最多等待一次读超时
        let mut preview = vec![0u8; config.input.preview_size];
        let n = ring.read(&mut preview);
        preview.truncate(n);
        if n == 0 {
            warn!("{} ⚠️ 打开时未收到数据，预览缓冲为空", log_ctx());
        }
        common.streaming(PreviewBuffer::from_bytes(preview));

        Ok(Self {
            ring,
            receiver: Some(ReceiverThread { handle, stop }),
            counters,
            local_addr,
            locator: locator.raw.clone(),
            common,
        })
    }

    /// 实际绑定的本地地址
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 接收线程是否仍在运行
    pub fn is_receiving(&self) -> bool {
        self.receiver
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// 环形缓冲中待读字节数
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    fn stop_receiver(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.stop.store(true, Ordering::Release);
            self.ring.close();
            if receiver.handle.join().is_err() {
                error!("{} ❌ 接收线程 panic", log_ctx());
            }
        }
    }
}

/// 绑定 UDP 端口，组播地址加入组播组
fn bind_socket(host: &str, port: u16) -> Result<UdpSocket> {
    let host = host.trim_start_matches('@');
    let ip: IpAddr = if host.is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        (host, port)
            .to_socket_addrs()
            .map_err(|e| NetBufError::Resolve(format!("{}: {}", host, e)))?
            .next()
            .ok_or_else(|| NetBufError::Resolve(host.to_string()))?
            .ip()
    };

    let bind_err = |e: std::io::Error| NetBufError::Connect(format!("绑定 {}:{} 失败: {}", ip, port, e));

    match ip {
        IpAddr::V4(group) if group.is_multicast() => {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).map_err(bind_err)?;
            socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
            info!("📡 加入组播组 {}", group);
            Ok(socket)
        }
        IpAddr::V6(group) if group.is_multicast() => {
            let socket = UdpSocket::bind((Ipv6Addr::UNSPECIFIED, port)).map_err(bind_err)?;
            socket.join_multicast_v6(&group, 0)?;
            info!("📡 加入组播组 {}", group);
            Ok(socket)
        }
        _ => UdpSocket::bind(SocketAddr::new(ip, port)).map_err(bind_err),
    }
}

/// 接收循环（在独立线程中运行）
///
/// 瞬时错误（超时 / 被信号打断）继续；其他错误结束线程，读端随后只会看到数据断流
fn receive_loop(
    socket: UdpSocket,
    ring: Arc<RingBuffer>,
    counters: Arc<ProducerCounters>,
    stop: Arc<AtomicBool>,
    strip_rtp: bool,
    datagram_size: usize,
) {
    info!("{} 🎬 接收线程启动: {:?}", log_ctx(), socket.local_addr().ok());
    let mut buf = vec![0u8; datagram_size];

    while !stop.load(Ordering::Acquire) {
        let n = match socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if is_transient_io(&e) => continue,
            Err(e) => {
                error!("{} ❌ 接收失败，接收线程退出: {}", log_ctx(), e);
                break;
            }
        };

        let count = counters.datagrams.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = if strip_rtp {
            match rtp_payload(&buf[..n]) {
                Some(payload) => payload,
                None => {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("{} 丢弃畸形 RTP 包（{} 字节）", log_ctx(), n);
                    continue;
                }
            }
        } else {
            &buf[..n]
        };

        if count <= 5 || count % 1000 == 0 {
            debug!("{} 📦 收到数据报 #{}（负载 {} 字节）", log_ctx(), count, payload.len());
        }

        // 缓冲满时阻塞，关闭后返回不足
        if ring.write(payload) < payload.len() {
            break;
        }
    }

    info!(
        "{} 🛑 接收线程退出（共 {} 个数据报，丢弃 {} 个）",
        log_ctx(),
        counters.datagrams.load(Ordering::Relaxed),
        counters.dropped.load(Ordering::Relaxed)
    );
}

impl StreamSource for RtpSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let ring = &self.ring;
        let n = self.common.read_with(buf, |rest, _| Ok(ring.read(rest)))?;
        self.common.stats.dropped_packets = self.counters.dropped.load(Ordering::Relaxed);
        Ok(n)
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

    /// 先停止并 join 接收线程，再释放环形缓冲
    fn dispose(&mut self) {
        if self.receiver.is_some() {
            info!("{} 🛑 关闭输入: {}", log_ctx(), self.locator);
        }
        self.stop_receiver();
        self.common.dispose();
    }

    fn description(&self) -> String {
        self.locator.clone()
    }
}

impl Drop for RtpSource {
    fn drop(&mut self) {
        if self.receiver.is_some() {
            warn!("{} ⚠ RtpSource 被 drop，但未调用 dispose()，正在停止接收线程", log_ctx());
        }
        self.dispose();
    }
}
