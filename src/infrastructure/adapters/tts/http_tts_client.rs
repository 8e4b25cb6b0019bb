//! HTTP TTS Client - 调用外部合成服务
//!
//! 实现 TtsEnginePort trait，通过 HTTP 调用外部合成后端
//!
//! 外部合成 API:
//! POST {base}/v1/audio/speech
//! Request: {"input": "...", "voice": "...", "speed": 1.0}  (JSON)
//! Headers: Authorization: Bearer <api_key>（凭据随调用传入，不落盘）
//! Response: 原始音频字节
//!
//! 音色清单:
//! GET {base}/v1/audio/voices → {"voices": ["...", ...]}

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    SynthesisRequest, TtsCredentials, TtsEnginePort, TtsError,
};

/// 合成请求体 (JSON)
#[derive(Debug, Serialize)]
struct SpeechHttpRequest {
    /// 要合成的文本
    input: String,
    /// 音色标识
    voice: String,
    /// 语速倍率
    speed: f32,
    /// 固定要 WAV，时钟音源靠 WAV 头测长
    response_format: &'static str,
}

/// 音色清单响应体
#[derive(Debug, Deserialize)]
struct VoiceListResponse {
    voices: Vec<String>,
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// 合成服务基础 URL（调用方凭据可逐次覆盖）
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 服务端兜底 API key，调用方凭据优先
    pub api_key: Option<String>,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8880".to_string(),
            timeout_secs: 120,
            api_key: None,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// HTTP TTS 客户端
///
/// 取消信号到达时中止传输层调用（不是只丢弃结果），
/// 并以 `TtsError::Cancelled` 收场
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn base_url<'a>(&'a self, credentials: &'a TtsCredentials) -> &'a str {
        credentials
            .base_url
            .as_deref()
            .unwrap_or(&self.config.base_url)
    }

    fn speech_url(&self, credentials: &TtsCredentials) -> String {
        format!("{}/v1/audio/speech", self.base_url(credentials))
    }

    fn voices_url(&self, credentials: &TtsCredentials) -> String {
        format!("{}/v1/audio/voices", self.base_url(credentials))
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url)
    }

    fn apply_auth(
        &self,
        builder: reqwest::RequestBuilder,
        credentials: &TtsCredentials,
    ) -> reqwest::RequestBuilder {
        match credentials.api_key.as_deref().or(self.config.api_key.as_deref()) {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn map_transport_error(e: reqwest::Error) -> TtsError {
        if e.is_timeout() {
            TtsError::Timeout
        } else if e.is_connect() {
            TtsError::NetworkError(format!("Cannot connect to synthesis service: {}", e))
        } else {
            TtsError::NetworkError(e.to_string())
        }
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        credentials: &TtsCredentials,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, TtsError> {
        let http_request = SpeechHttpRequest {
            input: request.text.clone(),
            voice: request.voice.clone(),
            speed: request.speed,
            response_format: "wav",
        };

        tracing::debug!(
            url = %self.speech_url(credentials),
            text_len = http_request.input.len(),
            voice = %http_request.voice,
            "Sending synthesis request"
        );

        let send = self
            .apply_auth(self.client.post(self.speech_url(credentials)), credentials)
            .json(&http_request)
            .send();

        // select 丢弃在途 future，传输层连接随之中止
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(TtsError::Cancelled),
            result = send => result.map_err(Self::map_transport_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TtsError::ServiceError {
                status: status.as_u16(),
                message,
            });
        }

        let audio = tokio::select! {
            _ = cancel.cancelled() => return Err(TtsError::Cancelled),
            bytes = response.bytes() => bytes
                .map_err(|e| TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))?
                .to_vec(),
        };

        if audio.is_empty() {
            return Err(TtsError::InvalidResponse(
                "upstream returned empty audio body".to_string(),
            ));
        }

        tracing::debug!(audio_size = audio.len(), "Synthesis completed");
        Ok(audio)
    }

    async fn list_voices(&self, credentials: &TtsCredentials) -> Result<Vec<String>, TtsError> {
        let response = self
            .apply_auth(self.client.get(self.voices_url(credentials)), credentials)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TtsError::ServiceError {
                status: status.as_u16(),
                message: "voice list query failed".to_string(),
            });
        }

        let parsed: VoiceListResponse = response
            .json()
            .await
            .map_err(|e| TtsError::InvalidResponse(format!("Malformed voice list: {}", e)))?;

        if parsed.voices.is_empty() {
            return Err(TtsError::InvalidResponse(
                "upstream returned empty voice list".to_string(),
            ));
        }
        Ok(parsed.voices)
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
