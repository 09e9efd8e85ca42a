use crate::control::BufferController;
use crate::core::{
    InputCapabilities, InputConfig, NetBufError, Result, SeekOrigin, SourceState, StreamLength,
};
use crate::input::preview::PreviewBuffer;
use crate::input::source::{read_full, seek_target, SourceCommon, StreamSource};
use crate::input::stats::InputStats;
use log::info;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// 本地文件输入
pub struct FileSource {
    file: Option<File>,
    path: PathBuf,
    length: u64,
    common: SourceCommon,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>, config: &InputConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        info!("📁 打开本地文件: {}", path.display());

        let mut common = SourceCommon::new(None);
        let mut file = File::open(&path)?;
        let length = file.metadata()?.len();

        let preview = PreviewBuffer::fill(config.preview_size, |buf| std::io::Read::read(&mut file, buf))?;
        common.streaming(preview);

        Ok(Self {
            file: Some(file),
            path,
            length,
            common,
        })
    }

    fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(NetBufError::Closed)
    }
}

impl StreamSource for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or(NetBufError::Closed)?;
        self.common.read_with(buf, |rest, on_stall| read_full(file, rest, on_stall))
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<u64> {
        let target = seek_target(offset, origin, self.common.position, self.length())?;
        let preview_len = self.common.preview.len() as u64;
        if target < preview_len {
            // 目标还在预览数据内，重新从预览缓冲读
            self.file_mut()?.seek(SeekFrom::Start(preview_len))?;
            self.common.preview.rewind(target as usize);
        } else {
            self.file_mut()?.seek(SeekFrom::Start(target))?;
            self.common.preview.discard();
        }

        self.common.position = target;
        Ok(target)
    }

    fn length(&self) -> StreamLength {
        StreamLength::Known(self.length)
    }

    fn position(&self) -> u64 {
        self.common.position
    }

    fn capabilities(&self) -> InputCapabilities {
        InputCapabilities::SEEKABLE | InputCapabilities::PREVIEW | InputCapabilities::BLOCK
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
        if self.file.take().is_some() {
            info!("🧹 关闭本地文件: {}", self.path.display());
        }
        self.common.dispose();
    }

    fn description(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::pool::BlockPool;
    use std::io::Write;

    fn sample_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn small_preview() -> InputConfig {
        InputConfig {
            preview_size: 4,
            ..InputConfig::default()
        }
    }

    #[test]
    fn test_read_through_preview() {
        let tmp = sample_file(b"0123456789");
        let mut source = FileSource::open(tmp.path(), &small_preview()).unwrap();
        assert_eq!(source.preview(), b"0123");
        assert_eq!(source.length(), StreamLength::Known(10));

        let mut buf = [0u8; 6];
        assert_eq!(source.read(&mut buf).unwrap(), 6);
        assert_eq!(&buf, b"012345");
        let mut rest = [0u8; 10];
        assert_eq!(source.read(&mut rest).unwrap(), 4);
        assert_eq!(&rest[..4], b"6789");
        assert_eq!(source.position(), 10);
    }

    #[test]
    fn test_seek_inside_and_past_preview() {
        let tmp = sample_file(b"abcdefghij");
        let mut source = FileSource::open(tmp.path(), &small_preview()).unwrap();
        let mut buf = [0u8; 3];

        assert_eq!(source.seek(2, SeekOrigin::Start).unwrap(), 2);
        source.read(&mut buf).unwrap();
        assert_eq!(&buf, b"cde");

        assert_eq!(source.seek(-3, SeekOrigin::End).unwrap(), 7);
        source.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hij");

        assert_eq!(source.seek(-9, SeekOrigin::Current).unwrap(), 1);
        source.read(&mut buf).unwrap();
        assert_eq!(&buf, b"bcd");

        assert!(matches!(source.seek(-1, SeekOrigin::Start), Err(NetBufError::NotSeekable)));
        assert!(matches!(source.seek(i64::MAX, SeekOrigin::End), Err(NetBufError::NotSeekable)));
        assert_eq!(source.position(), 4);
    }

    #[test]
    fn test_read_block_and_dispose() {
        let tmp = sample_file(&[7u8; 20]);
        let mut source = FileSource::open(tmp.path(), &small_preview()).unwrap();
        let pool = BlockPool::new(16, 2);

        let block = source.read_block(&pool).unwrap().unwrap();
        assert_eq!(block.len(), 16);
        drop(block);
        let block = source.read_block(&pool).unwrap().unwrap();
        assert_eq!(block.len(), 4);
        drop(block);
        assert!(source.read_block(&pool).unwrap().is_none());
        assert_eq!(pool.available(), 1);

        source.dispose();
        assert_eq!(source.state(), SourceState::Closed);
        let mut buf = [0u8; 1];
        assert!(matches!(source.read(&mut buf), Err(NetBufError::Closed)));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            FileSource::open("/nonexistent/myy_netbuf", &InputConfig::default()),
            Err(NetBufError::Io(_))
        ));
    }
}
