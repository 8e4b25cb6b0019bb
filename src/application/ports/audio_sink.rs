//! Audio Sink Port - 音频输出抽象
//!
//! 播放控制器通过此端口驱动音源。实现方负责把一段已解码的
//! 音频送出（或等价地模拟播放时长），并区分自然播完与被打断。

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Sink 错误
#[derive(Debug, Error)]
pub enum SinkError {
    /// 音频数据无法解析/播放
    #[error("Unplayable audio: {0}")]
    Unplayable(String),
}

/// 一次播放的收场方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// 自然播完，可触发自动推进
    Completed,
    /// 被取消打断，不得推进
    Interrupted,
}

/// Audio Sink Port
///
/// 调用方保证同一时刻至多一次 play 在途（单活跃音源不变量）
#[async_trait]
pub trait AudioSinkPort: Send + Sync {
    /// 播放一段音频，直到播完或 cancel 触发
    async fn play(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> Result<PlaybackOutcome, SinkError>;
}
