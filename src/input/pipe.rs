use crate::control::BufferController;
use crate::core::{InputCapabilities, InputConfig, NetBufError, Result, SeekOrigin, SourceState, StreamLength};
use crate::input::preview::PreviewBuffer;
use crate::input::source::{read_full, seek_forward_only, SourceCommon, StreamSource};
use crate::input::stats::InputStats;
use log::info;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 标准输入 / 命名管道输入
///
/// 只能向前读，长度未知
pub struct PipeSource {
    reader: Option<Box<dyn Read + Send>>,
    name: String,
    common: SourceCommon,
}

impl PipeSource {
    /// 读取标准输入
    pub fn stdin(config: &InputConfig, controller: Option<BufferController>) -> Result<Self> {
        info!("📥 打开标准输入");
        Self::from_reader("stdin://".to_string(), Box::new(std::io::stdin()), config, controller)
    }

    /// 读取命名管道（打开时会阻塞到有写端为止）
    pub fn fifo(
        path: impl AsRef<Path>,
        config: &InputConfig,
        controller: Option<BufferController>,
    ) -> Result<Self> {
        let path = path.as_ref();
        info!("📥 打开命名管道: {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(format!("fifo://{}", path.display()), Box::new(file), config, controller)
    }

    /// 包装任意阻塞读取器
    pub fn from_reader(
        name: String,
        mut reader: Box<dyn Read + Send>,
        config: &InputConfig,
        controller: Option<BufferController>,
    ) -> Result<Self> {
        let mut common = SourceCommon::new(controller);
        let preview = PreviewBuffer::fill(config.preview_size, |buf| reader.read(buf))?;
        common.streaming(preview);

        Ok(Self {
            reader: Some(reader),
            name,
            common,
        })
    }
}

impl StreamSource for PipeSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or(NetBufError::Closed)?;
        self.common.read_with(buf, |rest, on_stall| read_full(reader.as_mut(), rest, on_stall))
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
        if self.reader.take().is_some() {
            info!("🧹 关闭输入: {}", self.name);
        }
        self.common.dispose();
    }

    fn description(&self) -> String {
        self.name.clone()
    }
}

impl Drop for PipeSource {
    fn drop(&mut self) {
        self.dispose();
    }
}
