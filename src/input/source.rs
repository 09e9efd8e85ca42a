use crate::control::BufferController;
use crate::core::{
    is_timeout_io, InputCapabilities, NetBufError, Result, SeekOrigin, SourceState, StreamLength,
};
use crate::input::pool::{BlockPool, PooledBlock};
use crate::input::preview::PreviewBuffer;
use crate::input::stats::InputStats;
use std::io::{ErrorKind, Read};
use std::thread;
use std::time::Duration;

/// 输入源抽象接口
///
/// 所有输入源（本地文件、管道、TCP、HTTP、RTP/UDP）实现这个接口，
/// 缓冲控制和解码管线可以统一对待它们
pub trait StreamSource: Send {
    /// 阻塞读取
    ///
    /// 先消费预览缓冲，再读取实际传输层。只有在流结束或不可恢复的错误时才会少于请求长度，
    /// 瞬时错误（EAGAIN 等）在内部重试
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// 读取一个数据块
    ///
    /// 数据块在读取前从池中借出，读取出错时随 drop 归还
    ///
    /// 返回：
    /// - Ok(Some(block)): 成功读取
    /// - Ok(None): 流结束
    fn read_block(&mut self, pool: &BlockPool) -> Result<Option<PooledBlock>> {
        let mut block = pool.acquire();
        let n = self.read(block.storage_mut())?;
        if n == 0 {
            return Ok(None);
        }
        block.set_len(n);
        Ok(Some(block))
    }

    /// Seek，返回新的位置
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64>;

    /// 流长度（尽力而为）
    fn length(&self) -> StreamLength;

    /// 当前逻辑位置
    fn position(&self) -> u64;

    fn capabilities(&self) -> InputCapabilities;

    /// 打开时读取的预览数据
    fn preview(&self) -> &[u8];

    fn state(&self) -> SourceState;

    fn stats(&self) -> &InputStats;

    /// 该输入源拥有的缓冲控制器
    fn buffer_controller(&self) -> Option<&BufferController>;

    /// 释放传输层句柄和缓冲控制器，重复调用无副作用
    fn dispose(&mut self);

    /// 获取描述信息（用于调试）
    fn description(&self) -> String;
}

/// 各输入源共用的读取路径：预览缓冲、统计、位置以及缓冲控制的 check 调用点
pub(crate) struct SourceCommon {
    pub preview: PreviewBuffer,
    pub controller: Option<BufferController>,
    pub stats: InputStats,
    pub position: u64,
    pub state: SourceState,
}

impl SourceCommon {
    pub fn new(controller: Option<BufferController>) -> Self {
        Self {
            preview: PreviewBuffer::new(),
            controller,
            stats: InputStats::new(),
            position: 0,
            state: SourceState::Opening,
        }
    }

    /// 打开完成，进入 Streaming
    pub fn streaming(&mut self, preview: PreviewBuffer) {
        self.preview = preview;
        self.stats.start();
        self.state = SourceState::Streaming;
    }

    /// 先读预览缓冲，不足部分交给 `transport`，之后调用缓冲控制
    ///
    /// `transport` 的第二个参数在传输层读超时（断流）时调用，
    /// 阻塞等待期间缓冲控制也能及时暂停时钟
    pub fn read_with<F>(&mut self, buf: &mut [u8], transport: F) -> Result<usize>
    where
        F: FnOnce(&mut [u8], &mut dyn FnMut()) -> Result<usize>,
    {
        if self.state == SourceState::Closed {
            return Err(NetBufError::Closed);
        }

        let mut n = self.preview.read(buf);
        if n < buf.len() {
            let controller = &mut self.controller;
            let stats = &mut self.stats;
            let mut on_stall = || {
                stats.record_starvation();
                if let Some(controller) = controller.as_mut() {
                    controller.check();
                }
            };
            n += transport(&mut buf[n..], &mut on_stall)?;
        }

        self.position += n as u64;
        if n < buf.len() {
            self.stats.record_starvation();
        }
        if n > 0 {
            self.stats.update(n);
        }

        if let Some(controller) = self.controller.as_mut() {
            controller.check();
        }

        Ok(n)
    }

    pub fn dispose(&mut self) {
        self.state = SourceState::Closed;
        if let Some(controller) = self.controller.take() {
            controller.dispose();
        }
    }
}

/// 读满 `buf` 或遇到 EOF，瞬时错误重试
///
/// 每次读超时调用一次 `on_stall`，不会因此返回短读
pub(crate) fn read_full<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    on_stall: &mut dyn FnMut(),
) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if is_timeout_io(&e) => {
                on_stall();
                if e.kind() == ErrorKind::WouldBlock {
                    // 非阻塞读取器会立即返回 WouldBlock
                    thread::sleep(Duration::from_millis(10));
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// 只能向前 seek 的输入源：通过读取并丢弃数据前进，拒绝向后移动
pub(crate) fn seek_forward_only<S: StreamSource + ?Sized>(
    source: &mut S,
    offset: i64,
    origin: SeekOrigin,
) -> Result<u64> {
    let current = source.position();
    let target = seek_target(offset, origin, current, source.length())?;
    if target < current {
        return Err(NetBufError::NotSeekable);
    }

    let mut remaining = target - current;
    let mut scratch = [0u8; 4096];
    while remaining > 0 {
        let chunk = remaining.min(scratch.len() as u64) as usize;
        let n = source.read(&mut scratch[..chunk])?;
        if n == 0 {
            break;
        }
        remaining -= n as u64;
    }

    Ok(source.position())
}

/// 计算 seek 目标位置，溢出或落在 0 之前时返回 NotSeekable
pub(crate) fn seek_target(offset: i64, origin: SeekOrigin, current: u64, length: StreamLength) -> Result<u64> {
    let base = match origin {
        SeekOrigin::Start => 0,
        SeekOrigin::Current => current,
        SeekOrigin::End => length.known().ok_or(NetBufError::NotSeekable)?,
    };
    let base = i64::try_from(base).map_err(|_| NetBufError::NotSeekable)?;
    let target = base.checked_add(offset).ok_or(NetBufError::NotSeekable)?;
    u64::try_from(target).map_err(|_| NetBufError::NotSeekable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// 每次只返回少量字节，并穿插瞬时错误
    struct Flaky {
        data: Vec<u8>,
        pos: usize,
        calls: usize,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            let n = buf.len().min(3).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_read_full_retries_transient() {
        let mut reader = Flaky {
            data: b"abcdefghij".to_vec(),
            pos: 0,
            calls: 0,
        };
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf, &mut || {}).unwrap(), 8);
        assert_eq!(&buf, b"abcdefgh");
        assert_eq!(read_full(&mut reader, &mut buf, &mut || {}).unwrap(), 2);
    }

    #[test]
    fn test_read_full_propagates_permanent_error() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::ConnectionReset))
            }
        }
        let mut buf = [0u8; 4];
        assert!(matches!(read_full(&mut Broken, &mut buf, &mut || {}), Err(NetBufError::Io(_))));
    }

    #[test]
    fn test_common_reads_preview_first() {
        let mut common = SourceCommon::new(None);
        common.streaming(PreviewBuffer::from_bytes(b"head".to_vec()));
        let mut buf = [0u8; 6];
        let n = common
            .read_with(&mut buf, |rest, _| {
                rest.copy_from_slice(b"ER");
                Ok(2)
            })
            .unwrap();
        assert_eq!(n, 6);
        assert_eq!(&buf, b"headER");
        assert_eq!(common.position, 6);
    }

    /// 前两次读超时，之后才有数据
    struct Stalling {
        timeouts: usize,
    }

    impl Read for Stalling {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.timeouts > 0 {
                self.timeouts -= 1;
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            buf.fill(7);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_read_full_reports_each_stall() {
        let mut reader = Stalling { timeouts: 2 };
        let mut stalls = 0;
        let mut buf = [0u8; 4];
        assert_eq!(read_full(&mut reader, &mut buf, &mut || stalls += 1).unwrap(), 4);
        assert_eq!(stalls, 2);
        assert_eq!(buf, [7; 4]);
    }

    #[test]
    fn test_common_counts_stalls_as_starvation() {
        let mut common = SourceCommon::new(None);
        common.streaming(PreviewBuffer::new());
        let mut reader = Stalling { timeouts: 3 };
        let mut buf = [0u8; 4];
        let n = common
            .read_with(&mut buf, |rest, on_stall| read_full(&mut reader, rest, on_stall))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(common.stats.starvations, 3);
    }

    #[test]
    fn test_seek_target_overflow() {
        let unknown = StreamLength::Unknown;
        assert_eq!(seek_target(5, SeekOrigin::Current, 1, unknown).unwrap(), 6);
        assert!(matches!(
            seek_target(i64::MAX, SeekOrigin::Current, 1, unknown),
            Err(NetBufError::NotSeekable)
        ));
        assert!(matches!(
            seek_target(1, SeekOrigin::End, 0, StreamLength::Known(u64::MAX)),
            Err(NetBufError::NotSeekable)
        ));
        assert!(matches!(
            seek_target(-3, SeekOrigin::Start, 0, unknown),
            Err(NetBufError::NotSeekable)
        ));
        assert!(matches!(seek_target(0, SeekOrigin::End, 0, unknown), Err(NetBufError::NotSeekable)));
        assert_eq!(seek_target(-2, SeekOrigin::End, 0, StreamLength::Known(10)).unwrap(), 8);
    }

    #[test]
    fn test_common_closed() {
        let mut common = SourceCommon::new(None);
        common.dispose();
        let mut buf = [0u8; 1];
        assert!(matches!(common.read_with(&mut buf, |_, _| Ok(0)), Err(NetBufError::Closed)));
    }
}
