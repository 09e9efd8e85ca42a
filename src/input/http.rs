use crate::control::BufferController;
use crate::core::{InputCapabilities, InputConfig, NetBufError, Result, SeekOrigin, SourceState, StreamLength};
use crate::input::preview::PreviewBuffer;
use crate::input::source::{read_full, seek_forward_only, SourceCommon, StreamSource};
use crate::input::stats::InputStats;
use crate::input::tcp;
use log::{debug, info, warn};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use url::Url;

/// 响应头最大长度
const MAX_HEADER_SIZE: usize = 64 * 1024;

/// HTTP 响应头
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHead {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// 解析状态行和头部（不含结尾空行之后的内容）
    pub fn parse(head: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n").flat_map(|l| l.split('\n'));

        let status_line = lines
            .next()
            .ok_or_else(|| NetBufError::Protocol("空响应".to_string()))?;
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(NetBufError::Protocol(format!("无效状态行: {}", status_line)));
        }
        let status: u16 = parts
            .next()
            .and_then(|code| code.trim().parse().ok())
            .ok_or_else(|| NetBufError::Protocol(format!("无效状态码: {}", status_line)))?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        let headers = lines
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), value.trim().to_string()))
            })
            .collect();

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// 按名称查找头部（大小写不敏感）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("Content-Length").and_then(|v| v.parse().ok())
    }

    /// 拒绝重定向和非 2xx 响应
    pub fn check_status(&self) -> Result<()> {
        match self.status {
            200..=299 => Ok(()),
            300..=399 => Err(NetBufError::HttpRedirect {
                status: self.status,
                location: self.header("Location").unwrap_or_default().to_string(),
            }),
            _ => Err(NetBufError::Http {
                status: self.status,
                reason: self.reason.clone(),
            }),
        }
    }
}

/// 在缓冲中找到头部结束位置，返回（头部长度，正文起点）
fn find_header_end(buf: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    buf.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, pos + 2))
}

/// HTTP/1.0 GET 输入
pub struct HttpSource {
    stream: Option<TcpStream>,
    url: Url,
    head: ResponseHead,
    common: SourceCommon,
}

impl HttpSource {
    pub fn open(
        locator: &str,
        config: &InputConfig,
        controller: Option<BufferController>,
    ) -> Result<Self> {
        let url = Url::parse(locator).map_err(|e| NetBufError::InvalidLocator(format!("{}: {}", locator, e)))?;
        if url.scheme() != "http" {
            return Err(NetBufError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| NetBufError::InvalidLocator(locator.to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);

        info!("🌐 打开 HTTP 输入: {}", url);
        let mut common = SourceCommon::new(controller);
        let mut stream = tcp::connect(&host, port, config)?;

        let request = build_request(&url, &config.user_agent);
        debug!("📤 HTTP 请求:\n{}", request.trim_end());
        stream.write_all(request.as_bytes())?;

        let (head, body_start) = read_response_head(&mut stream)?;
        debug!("📥 HTTP 响应: {} {}", head.status, head.reason);
        if let Err(e) = head.check_status() {
            warn!("❌ HTTP 请求失败: {}", e);
            return Err(e);
        }

        // 与头部一起收到的正文放在预览缓冲最前面
        let mut preview_data = body_start;
        if preview_data.len() < config.preview_size {
            let rest = PreviewBuffer::fill(config.preview_size - preview_data.len(), |buf| stream.read(buf))?;
            preview_data.extend_from_slice(rest.peek());
        }
        common.streaming(PreviewBuffer::from_bytes(preview_data));

        info!(
            "✅ HTTP 连接成功: {} {}（长度: {:?}）",
            head.status,
            head.reason,
            head.content_length()
        );

        Ok(Self {
            stream: Some(stream),
            url,
            head,
            common,
        })
    }

    pub fn response_head(&self) -> &ResponseHead {
        &self.head
    }
}

fn build_request(url: &Url, user_agent: &str) -> String {
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    // host_str 对 IPv6 保留方括号；默认端口时 port() 为 None
    let host = url.host_str().unwrap_or_default();
    let host_header = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    format!(
        "GET {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nConnection: close\r\n\r\n",
        path, host_header, user_agent
    )
}

/// 读取响应头，返回头部和已经读到的正文
fn read_response_head<R: Read>(reader: &mut R) -> Result<(ResponseHead, Vec<u8>)> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        if let Some((head_len, body_start)) = find_header_end(&buf) {
            let head = ResponseHead::parse(&buf[..head_len])?;
            return Ok((head, buf[body_start..].to_vec()));
        }
        if buf.len() > MAX_HEADER_SIZE {
            return Err(NetBufError::Protocol("HTTP 响应头过长".to_string()));
        }
        let n = read_some(reader, &mut chunk)?;
        if n == 0 {
            return Err(NetBufError::Protocol("连接在响应头结束前关闭".to_string()));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// 单次读取，被信号打断时重试
///
/// 读超时直接返回错误，服务器迟迟不发响应头时 open 失败而不是一直阻塞
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

impl StreamSource for HttpSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(NetBufError::Closed)?;
        self.common.read_with(buf, |rest, on_stall| read_full(stream, rest, on_stall))
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        seek_forward_only(self, offset, origin)
    }

    fn length(&self) -> StreamLength {
        match self.head.content_length() {
            Some(len) => StreamLength::Known(len),
            None => StreamLength::Unknown,
        }
    }

    fn position(&self) -> u64 {
        self.common.position
    }

    fn capabilities(&self) -> InputCapabilities {
        InputCapabilities::PREVIEW | InputCapabilities::BLOCK
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
            info!("🔌 断开 HTTP 连接: {}", self.url);
        }
        self.common.dispose();
    }

    fn description(&self) -> String {
        self.url.to_string()
    }
}

impl Drop for HttpSource {
    fn drop(&mut self) {
        self.dispose();
    }
}
