//! TTS Engine Port - 语音合成引擎抽象
//!
//! 定义对外部合成服务的抽象接口，具体实现在 infrastructure/adapters 层。
//! 凭据由调用方随调用传入，本端口的实现不得持久化凭据。

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 后端不可达或返回异常数据时的降级音色清单
pub const DEFAULT_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    /// 调用方主动中止，不算失败，不产生 error 日志
    #[error("synthesis cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    /// 上游返回非成功状态
    #[error("Synthesis failed: HTTP {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TtsError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TtsError::Cancelled)
    }
}

/// 合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 要合成的文本（已清洗）
    pub text: String,
    /// 音色标识
    pub voice: String,
    /// 语速倍率
    pub speed: f32,
}

/// 调用方随调用提供的后端凭据
///
/// 仅在单次调用内使用，端口实现不缓存不落盘
#[derive(Debug, Clone, Default)]
pub struct TtsCredentials {
    /// API key，作为 Bearer 头发送
    pub api_key: Option<String>,
    /// 覆盖配置中的服务地址
    pub base_url: Option<String>,
}

/// 批量路径的有界重试策略
///
/// 指数退避，延迟封顶。交互播放路径不使用重试。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 总尝试次数上限（含首次）
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// 第 attempt 次失败后的退避时长（attempt 从 0 计）
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// TTS Engine Port
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成一段文本，返回原始音频字节
    ///
    /// cancel 触发时必须中止传输层调用并返回 `TtsError::Cancelled`
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        credentials: &TtsCredentials,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TtsError>;

    /// 带重试的合成，供导出路径使用
    ///
    /// 有界尝试次数 + 指数退避；Cancelled 不重试直接上抛
    async fn synthesize_with_retry(
        &self,
        request: &SynthesisRequest,
        credentials: &TtsCredentials,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TtsError> {
        let mut attempt: u32 = 0;
        loop {
            match self.synthesize(request, credentials, cancel).await {
                Ok(audio) => return Ok(audio),
                Err(TtsError::Cancelled) => return Err(TtsError::Cancelled),
                Err(err) => {
                    attempt += 1;
                    if attempt >= policy.max_attempts.max(1) {
                        return Err(err);
                    }
                    let delay = policy.backoff_for(attempt - 1);
                    tracing::warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Synthesis attempt failed, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TtsError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// 查询可用音色清单（直通上游）
    ///
    /// 失败时调用方应降级到 `DEFAULT_VOICES`，而不是报错
    async fn list_voices(&self, credentials: &TtsCredentials) -> Result<Vec<String>, TtsError>;

    /// 检查合成服务是否可用
    async fn health_check(&self) -> bool {
        true // 默认实现
    }
}
