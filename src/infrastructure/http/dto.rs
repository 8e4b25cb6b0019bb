//! Data Transfer Objects

use serde::{Deserialize, Serialize};

use crate::application::ports::ExportFormat;
use crate::application::StateSnapshot;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Session DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    /// 文档全文
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    /// 覆盖默认分块上限（字符数）
    pub max_block_chars: Option<usize>,
    /// 调用方合成后端凭据，仅随会话存活
    pub api_key: Option<String>,
    pub tts_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionActionRequest {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub session_id: String,
    pub index: usize,
    #[serde(default)]
    pub autoplay: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub state: StateSnapshot,
}

// ============================================================================
// Audio DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GetAudioRequest {
    pub session_id: String,
    pub index: usize,
}

// ============================================================================
// Voice DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct VoiceListResponse {
    pub voices: Vec<String>,
    /// true 表示后端不可达，返回的是降级默认清单
    pub fallback: bool,
}

// ============================================================================
// Export DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Deserialize)]
pub struct ExportTextRequest {
    pub chapters: Vec<ExportTextChapter>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    #[serde(default)]
    pub format: ExportFormat,
    pub api_key: Option<String>,
    pub tts_base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportTextChapter {
    pub title: String,
    pub text: String,
}
