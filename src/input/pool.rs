use crossbeam::queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 可复用的数据块池
///
/// `acquire()` 返回的 `PooledBlock` 在 drop 时把内存还给池子，
/// 即使阻塞读取途中出错或输入源被释放也不会泄漏
#[derive(Clone)]
pub struct BlockPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    available: ArrayQueue<Vec<u8>>,
    block_size: usize,
    total_allocated: AtomicUsize,
}

impl BlockPool {
    /// 创建数据块池，最多缓存 `max_blocks` 个空闲块
    pub fn new(block_size: usize, max_blocks: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                available: ArrayQueue::new(max_blocks.max(1)),
                block_size,
                total_allocated: AtomicUsize::new(0),
            }),
        }
    }

    pub fn acquire(&self) -> PooledBlock {
        let data = match self.inner.available.pop() {
            Some(data) => data,
            None => {
                self.inner.total_allocated.fetch_add(1, Ordering::Relaxed);
                vec![0u8; self.inner.block_size]
            }
        };
        PooledBlock {
            data: Some(data),
            len: 0,
            pool: self.inner.clone(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// 空闲块数量
    pub fn available(&self) -> usize {
        self.inner.available.len()
    }

    pub fn total_allocated(&self) -> usize {
        self.inner.total_allocated.load(Ordering::Relaxed)
    }
}

/// 从池中借出的数据块
pub struct PooledBlock {
    data: Option<Vec<u8>>,
    /// 有效数据长度
    len: usize,
    pool: Arc<PoolInner>,
}

impl PooledBlock {
    /// 整块可写空间
    pub fn storage_mut(&mut self) -> &mut [u8] {
        self.data.as_deref_mut().unwrap_or_default()
    }

    pub fn set_len(&mut self, len: usize) {
        let capacity = self.data.as_ref().map_or(0, Vec::len);
        debug_assert!(len <= capacity);
        self.len = len.min(capacity);
    }
}

impl Deref for PooledBlock {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[..self.len],
            None => &[],
        }
    }
}

impl DerefMut for PooledBlock {
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        match &mut self.data {
            Some(data) => &mut data[..len],
            None => &mut [],
        }
    }
}

impl Drop for PooledBlock {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            if data.len() == self.pool.block_size {
                // 池子满了就直接释放
                let _ = self.pool.available.push(data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_returns_to_pool() {
        let pool = BlockPool::new(16, 4);
        {
            let mut block = pool.acquire();
            block.storage_mut()[..3].copy_from_slice(b"abc");
            block.set_len(3);
            assert_eq!(&block[..], b"abc");
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);

        let _again = pool.acquire();
        assert_eq!(pool.total_allocated(), 1);
    }

    #[test]
    fn test_pool_bounded() {
        let pool = BlockPool::new(8, 1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.total_allocated(), 2);
    }
}
