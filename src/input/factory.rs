use crate::control::{BufferController, PipelineHandles};
use crate::core::{Locator, NetBufConfig, Result, Scheme};
use crate::input::file::FileSource;
use crate::input::http::HttpSource;
use crate::input::pool::BlockPool;
use crate::input::pipe::PipeSource;
use crate::input::rtp::RtpSource;
use crate::input::source::StreamSource;
use crate::input::tcp::TcpSource;
use crossbeam_channel::Sender;
use log::{error, info};
use std::thread;

/// 数据块池最多缓存的空闲块数
const POOL_BLOCKS: usize = 32;

/// 输入源创建结果
pub enum SourceCreationResult {
    Success {
        source: Box<dyn StreamSource>,
        locator: String,
    },
    Failed {
        locator: String,
        error: String,
    },
}

/// 输入源工厂
///
/// 使用方法：
/// ```no_run
/// use myy_netbuf::input::{SourceCreationResult, SourceFactory};
/// use myy_netbuf::core::NetBufConfig;
///
/// let (tx, rx) = crossbeam_channel::unbounded();
/// SourceFactory::open_async("http://example.com/live.ts".to_string(), NetBufConfig::default(), None, tx);
///
/// match rx.recv().unwrap() {
///     SourceCreationResult::Success { source, .. } => println!("{}", source.description()),
///     SourceCreationResult::Failed { error, .. } => eprintln!("{}", error),
/// }
/// ```
pub struct SourceFactory;

impl SourceFactory {
    /// 解析地址并打开对应的输入源
    ///
    /// 容易卡顿的协议在提供了 `handles` 时会附带一个 BufferController
    pub fn open(
        locator: &str,
        config: &NetBufConfig,
        handles: Option<PipelineHandles>,
    ) -> Result<Box<dyn StreamSource>> {
        config.validate()?;
        let locator = Locator::parse(locator)?;

        let controller = match handles {
            Some(handles) if locator.scheme.needs_buffer_control() => {
                Some(BufferController::new(handles, config.buffer.clone()))
            }
            _ => None,
        };

        info!(
            "🔨 打开输入源: {}（缓冲控制: {}）",
            locator.raw,
            if controller.is_some() { "启用" } else { "关闭" }
        );

        let source: Box<dyn StreamSource> = match locator.scheme {
            Scheme::File => Box::new(FileSource::open(locator.path(), &config.input)?),
            Scheme::Stdin => Box::new(PipeSource::stdin(&config.input, controller)?),
            Scheme::Fifo => Box::new(PipeSource::fifo(locator.path(), &config.input, controller)?),
            Scheme::Tcp => {
                let (host, port) = locator.host_port()?;
                Box::new(TcpSource::open(&host, port, &config.input, controller)?)
            }
            Scheme::Http => Box::new(HttpSource::open(&locator.raw, &config.input, controller)?),
            Scheme::Rtp | Scheme::Udp => Box::new(RtpSource::open(&locator, config, controller)?),
        };

        Ok(source)
    }

    /// 按 `input.block_size` 创建数据块池，供 `StreamSource::read_block` 使用
    pub fn block_pool(config: &NetBufConfig) -> BlockPool {
        BlockPool::new(config.input.block_size, POOL_BLOCKS)
    }

    /// 在子线程中打开输入源（网络连接 / 握手可能耗时较长）
    pub fn open_async(
        locator: String,
        config: NetBufConfig,
        handles: Option<PipelineHandles>,
        result_tx: Sender<SourceCreationResult>,
    ) {
        thread::spawn(move || {
            let result = match Self::open(&locator, &config, handles) {
                Ok(source) => SourceCreationResult::Success { source, locator },
                Err(e) => {
                    error!("❌ 打开输入源失败: {} ({})", locator, e);
                    SourceCreationResult::Failed {
                        locator,
                        error: e.to_string(),
                    }
                }
            };

            // 发送结果
            if let Err(e) = result_tx.send(result) {
                error!("❌ 发送输入源创建结果失败: {}", e);
            }
        });
    }
}
