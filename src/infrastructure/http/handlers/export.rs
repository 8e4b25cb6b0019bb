//! Export Handlers - 有声书导出
//!
//! 两个入口共用一条装配管线：
//! - export: multipart，每个 part 一章（filename 为章节名，字节为原始音频）
//! - export_text: JSON 文本章节，服务端合成（带重试）后装配
//!
//! 响应为容器字节流。客户端断开时 handler future 被丢弃，
//! 取消守卫级联终止子进程，工作集随流一起清理。

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::TtsCredentials;
use crate::application::{AudiobookOutput, ChapterInput, TextChapter};
use crate::infrastructure::http::dto::{ExportParams, ExportTextRequest};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 导出：调用方上传各章原始音频
pub async fn export_audiobook(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut chapters = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        let title = field
            .file_name()
            .map(strip_audio_extension)
            .or_else(|| field.name().map(|n| n.to_string()))
            .unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read chapter upload: {}", e)))?;

        chapters.push(ChapterInput {
            title,
            raw_audio: data.to_vec(),
        });
    }

    tracing::info!(chapters = chapters.len(), format = %params.format, "Export requested");

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let output = state
        .assembler
        .assemble(chapters, params.format, &cancel)
        .await?;

    stream_response(output, params.format.extension())
}

/// 导出：服务端合成文本章节
pub async fn export_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExportTextRequest>,
) -> Result<Response, ApiError> {
    let playback = &state.config.playback;
    let voice = req
        .voice
        .unwrap_or_else(|| playback.default_voice.clone());
    let speed = req.speed.unwrap_or(playback.default_speed);
    let credentials = TtsCredentials {
        api_key: req.api_key,
        base_url: req.tts_base_url,
    };
    let chapters: Vec<TextChapter> = req
        .chapters
        .into_iter()
        .map(|c| TextChapter {
            title: c.title,
            text: c.text,
        })
        .collect();

    tracing::info!(chapters = chapters.len(), format = %req.format, "Text export requested");

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let output = state
        .assembler
        .assemble_from_text(chapters, &voice, speed, &credentials, req.format, &cancel)
        .await?;

    stream_response(output, req.format.extension())
}

/// 把装配产物包成流式响应；流持有工作集，断流即清理
fn stream_response(output: AudiobookOutput, extension: &str) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, output.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"audiobook.{}\"", extension),
        )
        .body(Body::from_stream(output.stream))
        .map_err(|e| ApiError::internal(format!("failed to build export response: {}", e)))
}

/// 上传文件名去掉音频扩展名作为章节名
fn strip_audio_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext))
            if matches!(
                ext.to_ascii_lowercase().as_str(),
                "wav" | "mp3" | "m4a" | "m4b" | "aac" | "ogg" | "opus" | "flac"
            ) =>
        {
            stem.to_string()
        }
        _ => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_audio_extension() {
        assert_eq!(strip_audio_extension("Chapter 1.mp3"), "Chapter 1");
        assert_eq!(strip_audio_extension("intro.WAV"), "intro");
        assert_eq!(strip_audio_extension("no-extension"), "no-extension");
        assert_eq!(strip_audio_extension("v1.2-notes.txt"), "v1.2-notes.txt");
    }
}
