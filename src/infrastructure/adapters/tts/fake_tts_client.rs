//! Fake TTS Client - 本地假合成引擎
//!
//! 不依赖外部服务，按配置时长生成静音 WAV。用于开发联调与测试：
//! 行为确定、延迟可控，取消语义与真实客户端一致。

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    SynthesisRequest, TtsCredentials, TtsEnginePort, TtsError, DEFAULT_VOICES,
};

/// Fake TTS 配置
#[derive(Debug, Clone)]
pub struct FakeTtsClientConfig {
    /// 每个合成结果的固定时长（毫秒）
    pub duration_ms: u64,
    /// 采样率
    pub sample_rate: u32,
    /// 模拟的合成延迟
    pub latency: Duration,
}

impl Default for FakeTtsClientConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1500,
            sample_rate: 22050,
            latency: Duration::from_millis(50),
        }
    }
}

/// 假合成引擎
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        Self { config }
    }
}

impl Default for FakeTtsClient {
    fn default() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        _credentials: &TtsCredentials,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TtsError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TtsError::Cancelled),
            _ = tokio::time::sleep(self.config.latency) => {
                tracing::trace!(text_len = request.text.len(), "Fake synthesis completed");
                Ok(silent_wav(self.config.duration_ms, self.config.sample_rate))
            }
        }
    }

    async fn list_voices(&self, _credentials: &TtsCredentials) -> Result<Vec<String>, TtsError> {
        Ok(DEFAULT_VOICES.iter().map(|v| v.to_string()).collect())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// 生成静音 WAV（16 位单声道 PCM）
///
/// 44 字节 RIFF 头 + 全零采样，时长精确到采样点
pub fn silent_wav(duration_ms: u64, sample_rate: u32) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let num_channels: u16 = 1;
    let num_samples = (sample_rate as u64 * duration_ms / 1000) as usize;

    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = num_samples * 2;
    let file_size = 36 + data_size;

    let mut wav = Vec::with_capacity(44 + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(file_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    wav.resize(44 + data_size, 0);

    wav
}
