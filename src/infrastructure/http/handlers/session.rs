//! Session Handlers - 交互播放控制

use axum::{extract::State, Json};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::application::ports::TtsCredentials;
use crate::application::{PlaybackSession, PlaybackSessionConfig};
use crate::infrastructure::http::dto::{
    ApiResponse, Empty, JumpRequest, OpenSessionRequest, SessionActionRequest, SessionResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 开启播放会话：分块、建缓存、预取前两块
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let playback = &state.config.playback;
    let session_config = PlaybackSessionConfig {
        voice: req.voice.unwrap_or_else(|| playback.default_voice.clone()),
        speed: req.speed.unwrap_or(playback.default_speed),
        max_block_chars: req.max_block_chars.unwrap_or(playback.max_block_chars),
        cache_capacity: playback.cache_capacity,
        prefetch_delay: Duration::from_millis(playback.prefetch_delay_ms),
        credentials: TtsCredentials {
            api_key: req.api_key,
            base_url: req.tts_base_url,
        },
    };

    let session_id = Uuid::new_v4().to_string();
    let session = PlaybackSession::new(
        &session_id,
        session_config,
        state.tts_engine.clone(),
        state.audio_sink.clone(),
    );

    let snapshot = session.set_text(&req.text).await?;
    state.sessions.insert(session);

    Ok(Json(ApiResponse::success(SessionResponse {
        session_id,
        state: snapshot,
    })))
}

pub async fn toggle_play(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.toggle_play().await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn skip_forward(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.skip_forward().await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn skip_backward(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.skip_backward().await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn jump_to(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JumpRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.jump_to(req.index, req.autoplay).await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn stop(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.stop().await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.sessions.get(&req.session_id)?;
    let snapshot = session.status().await;
    Ok(Json(ApiResponse::success(SessionResponse {
        session_id: req.session_id,
        state: snapshot,
    })))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionActionRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state.sessions.close(&req.session_id)?;
    Ok(Json(ApiResponse::ok()))
}
