//! Voice Handlers - 音色清单直通

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ports::{TtsCredentials, DEFAULT_VOICES};
use crate::infrastructure::http::dto::{ApiResponse, VoiceListResponse};
use crate::infrastructure::http::state::AppState;

/// 列出可用音色
///
/// 后端不可达或返回异常数据时降级到固定默认清单，
/// 这是刻意的优雅降级，不作为错误返回
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<ApiResponse<VoiceListResponse>> {
    match state.tts_engine.list_voices(&TtsCredentials::default()).await {
        Ok(voices) => Json(ApiResponse::success(VoiceListResponse {
            voices,
            fallback: false,
        })),
        Err(err) => {
            tracing::warn!(error = %err, "Voice list unavailable, serving default list");
            Json(ApiResponse::success(VoiceListResponse {
                voices: DEFAULT_VOICES.iter().map(|v| v.to_string()).collect(),
                fallback: true,
            }))
        }
    }
}
