//! 应用层
//!
//! 端口定义 + 两个服务：
//! - playback: 交互播放会话（状态机驱动、缓存、预取、取消）
//! - export: 有声书装配（串行工具链、时间轴、流式产物）

pub mod cache;
pub mod error;
pub mod export;
pub mod playback;
pub mod ports;

pub use cache::{cache_key, AudioCache, DEFAULT_CACHE_CAPACITY};
pub use error::ApplicationError;
pub use export::{
    AssemblerConfig, AudiobookAssembler, AudiobookOutput, ChapterInput, TextChapter,
};
pub use playback::{PlaybackSession, PlaybackSessionConfig, StateSnapshot};
