//! 交互播放服务

mod controller;

pub use controller::{PlaybackSession, PlaybackSessionConfig, StateSnapshot};
