//! Audio Handlers - 块音频读取

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::infrastructure::http::dto::GetAudioRequest;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 取某一块的缓存音频
///
/// 未命中不算失败：返回 cache_miss 类别，客户端等 ready 后重试
pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GetAudioRequest>,
) -> Result<Response, ApiError> {
    let session = state.sessions.get(&req.session_id)?;

    let audio = session.cached_audio(req.index).await.ok_or_else(|| {
        ApiError::not_found(
            "cache_miss",
            format!("no cached audio for block {}", req.index),
        )
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "audio/wav")
        .header(header::CONTENT_LENGTH, audio.len())
        .body(Body::from(audio))
        .map_err(|e| ApiError::internal(format!("failed to build audio response: {}", e)))
}
