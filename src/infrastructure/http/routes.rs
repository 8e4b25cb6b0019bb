//! HTTP Routes
//!
//! API 路由定义
//!
//! API Endpoints:
//! - /api/ping                    GET   健康检查
//! - /api/session/open            POST  开启播放会话（分块 + 预取）
//! - /api/session/toggle          POST  播放/暂停
//! - /api/session/skip_forward    POST  下一块
//! - /api/session/skip_backward   POST  上一块
//! - /api/session/jump            POST  跳转到指定块
//! - /api/session/stop            POST  停止并复位
//! - /api/session/status          POST  查询会话状态
//! - /api/session/close           POST  关闭会话
//! - /api/audio                   POST  取某块缓存音频
//! - /api/voice/list              GET   音色清单（带降级）
//! - /api/audiobook/export        POST  导出（multipart 原始音频章节）
//! - /api/audiobook/export_text   POST  导出（JSON 文本章节，服务端合成）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/api", api_routes())
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/session", session_routes())
        .nest("/voice", voice_routes())
        .nest("/audiobook", audiobook_routes())
        .route("/audio", post(handlers::get_audio))
}

/// Session 路由
fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/open", post(handlers::open_session))
        .route("/toggle", post(handlers::toggle_play))
        .route("/skip_forward", post(handlers::skip_forward))
        .route("/skip_backward", post(handlers::skip_backward))
        .route("/jump", post(handlers::jump_to))
        .route("/stop", post(handlers::stop))
        .route("/status", post(handlers::status))
        .route("/close", post(handlers::close_session))
}

/// Voice 路由
fn voice_routes() -> Router<Arc<AppState>> {
    Router::new().route("/list", get(handlers::list_voices))
}

/// Audiobook 路由
fn audiobook_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/export", post(handlers::export_audiobook))
        .route("/export_text", post(handlers::export_text))
}
