use crate::core::is_timeout_io;
use std::io::ErrorKind;

/// 预览缓冲
///
/// 打开输入源时读取开头的若干字节供格式探测，正式读取时先消费这部分数据，保证不丢字节
#[derive(Debug, Default)]
pub struct PreviewBuffer {
    data: Vec<u8>,
    /// 已被 read 消费的字节数
    consumed: usize,
}

impl PreviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, consumed: 0 }
    }

    /// 用 `fill` 反复读取直到填满 `size` 字节、遇到 EOF 或读超时
    ///
    /// 预览只是尽力而为：直播源开头数据不足时，第一次读超时就结束，不足部分留给正式读取
    pub fn fill<F>(size: usize, mut fill: F) -> std::io::Result<Self>
    where
        F: FnMut(&mut [u8]) -> std::io::Result<usize>,
    {
        let mut data = vec![0u8; size];
        let mut filled = 0;
        while filled < size {
            match fill(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if is_timeout_io(&e) => break,
                Err(e) => return Err(e),
            }
        }
        data.truncate(filled);
        Ok(Self::from_bytes(data))
    }

    /// 完整的预览数据（不受消费影响）
    pub fn peek(&self) -> &[u8] {
        &self.data
    }

    /// 尚未被消费的字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.consumed
    }

    /// 从预览数据中读取，返回复制的字节数
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let n = self.remaining().min(out.len());
        out[..n].copy_from_slice(&self.data[self.consumed..self.consumed + n]);
        self.consumed += n;
        n
    }

    /// 把消费位置移回 `consumed`
    pub fn rewind(&mut self, consumed: usize) {
        self.consumed = consumed.min(self.data.len());
    }

    /// 丢弃剩余未消费的数据
    pub fn discard(&mut self) {
        self.consumed = self.data.len();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
