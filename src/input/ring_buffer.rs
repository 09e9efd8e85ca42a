use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// 固定容量的字节环形缓冲
///
/// 一个生产者线程（网络接收循环）写入，一个消费者线程（管线读取路径）读取：
/// - 写满时 `write()` 在 `space_available` 上阻塞，直到读端腾出空间
/// - 读空时 `read()` 在 `data_available` 上最多等待 `read_timeout`，超时返回已读到的字节
/// - `close()` 唤醒两端，用于取消
pub struct RingBuffer {
    state: Mutex<RingState>,
    data_available: Condvar,
    space_available: Condvar,
    capacity: usize,
    read_timeout: Duration,
}

struct RingState {
    data: Box<[u8]>,
    /// 写入位置（生产者）
    head: usize,
    /// 读取位置（消费者）
    tail: usize,
    count: usize,
    closed: bool,
}

impl RingBuffer {
    pub fn new(capacity: usize, read_timeout: Duration) -> Self {
        assert!(capacity > 0, "环形缓冲容量不能为 0");
        Self {
            state: Mutex::new(RingState {
                data: vec![0u8; capacity].into_boxed_slice(),
                head: 0,
                tail: 0,
                count: 0,
                closed: false,
            }),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            capacity,
            read_timeout,
        }
    }

    /// 写入全部数据，缓冲满时阻塞
    ///
    /// 返回写入的字节数；只有缓冲被关闭时才会少于 `data.len()`
    pub fn write(&self, data: &[u8]) -> usize {
        let mut state = self.state.lock();
        let mut written = 0;

        while written < data.len() {
            while state.count >= self.capacity && !state.closed {
                self.space_available.wait(&mut state);
            }
            if state.closed {
                break;
            }

            let n = (self.capacity - state.count).min(data.len() - written);
            let head = state.head;
            let first = n.min(self.capacity - head);
            state.data[head..head + first].copy_from_slice(&data[written..written + first]);
            if n > first {
                state.data[..n - first].copy_from_slice(&data[written + first..written + n]);
            }

            state.head = (head + n) % self.capacity;
            state.count += n;
            debug_assert!(state.count <= self.capacity, "环形缓冲溢出");
            written += n;

            self.data_available.notify_one();
        }

        written
    }

    /// 读取 `out.len()` 字节
    ///
    /// 缓冲为空时最多等待 `read_timeout`，超时（或已关闭且读空）返回已复制的字节数，可能为 0
    pub fn read(&self, out: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let mut copied = 0;
        let mut deadline: Option<Instant> = None;

        while copied < out.len() {
            if state.count == 0 {
                if state.closed {
                    break;
                }
                let until = *deadline.get_or_insert_with(|| Instant::now() + self.read_timeout);
                let timed_out = self.data_available.wait_until(&mut state, until).timed_out();
                if state.count == 0 {
                    if timed_out {
                        break;
                    }
                    continue;
                }
            }
            deadline = None;

            let n = state.count.min(out.len() - copied);
            let tail = state.tail;
            let first = n.min(self.capacity - tail);
            out[copied..copied + first].copy_from_slice(&state.data[tail..tail + first]);
            if n > first {
                out[copied + first..copied + n].copy_from_slice(&state.data[..n - first]);
            }

            state.tail = (tail + n) % self.capacity;
            state.count -= n;
            copied += n;

            self.space_available.notify_one();
        }

        copied
    }

    /// 关闭缓冲，唤醒所有等待者
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.data_available.notify_all();
        self.space_available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 当前可读字节数
    pub fn len(&self) -> usize {
        self.state.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}
