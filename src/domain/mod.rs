//! 领域层
//!
//! 纯逻辑，不做任何 I/O：
//! - segmenter: 文本清洗与分块
//! - playback: 播放状态机（纯转移函数）
//! - timeline: 章节时间轴与元数据文档

pub mod playback;
pub mod segmenter;
pub mod timeline;

pub use playback::{apply, Effect, PlaybackEvent, PlaybackPhase, PlaybackState};
pub use segmenter::{
    clean_text, segment, segment_default, Block, SegmentConfig, DEFAULT_MAX_BLOCK_CHARS,
};
pub use timeline::{ChapterMark, Timeline};
