//! HTTP Error Handling
//!
//! 统一错误封套：errno + 机器可读 kind + 人类可读 error。
//! 业务错误保持 HTTP 200，由 errno 区分，前端统一处理。

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::application::ApplicationError;
use crate::infrastructure::memory::SessionError;

/// 错误码定义
pub mod errno {
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const SERVICE_UNAVAILABLE: i32 = 503;
}

/// 统一错误响应格式
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub errno: i32,
    /// 机器可读错误类别（"mux_failed"、"cache_miss"……）
    pub kind: &'static str,
    pub error: String,
    pub data: Option<()>,
}

/// API 错误
#[derive(Debug)]
pub struct ApiError {
    errno: i32,
    kind: &'static str,
    message: String,
    /// 取消类错误不进 warn/error 日志
    cancelled: bool,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            errno: errno::BAD_REQUEST,
            kind: "bad_request",
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn not_found(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            errno: errno::NOT_FOUND,
            kind,
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            errno: errno::INTERNAL_ERROR,
            kind: "internal_error",
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.cancelled {
            tracing::debug!(kind = self.kind, "Request cancelled by caller");
        } else {
            match self.errno {
                errno::INTERNAL_ERROR | errno::SERVICE_UNAVAILABLE => {
                    tracing::error!(errno = self.errno, kind = self.kind, error = %self.message, "Request failed");
                }
                _ => {
                    tracing::warn!(errno = self.errno, kind = self.kind, error = %self.message, "Request rejected");
                }
            }
        }

        let response = ErrorResponse {
            errno: self.errno,
            kind: self.kind,
            error: self.message,
            data: None,
        };
        (StatusCode::OK, Json(response)).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        let errno = match &err {
            ApplicationError::InvalidInput(_) => errno::BAD_REQUEST,
            ApplicationError::SessionNotFound(_) => errno::NOT_FOUND,
            ApplicationError::Synthesis(_) => errno::SERVICE_UNAVAILABLE,
            ApplicationError::Pipeline(_)
            | ApplicationError::StorageError(_)
            | ApplicationError::InternalError(_) => errno::INTERNAL_ERROR,
        };
        Self {
            errno,
            kind: err.kind(),
            cancelled: err.is_cancelled(),
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => {
                Self::not_found("session_not_found", format!("session not found: {}", id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{PipelineError, TtsError};

    #[test]
    fn test_application_error_mapping() {
        let err = ApiError::from(ApplicationError::invalid_input("empty"));
        assert_eq!(err.errno, errno::BAD_REQUEST);
        assert_eq!(err.kind(), "invalid_input");

        let err = ApiError::from(ApplicationError::from(PipelineError::MuxFailed("x".into())));
        assert_eq!(err.errno, errno::INTERNAL_ERROR);
        assert_eq!(err.kind(), "mux_failed");

        let err = ApiError::from(ApplicationError::from(TtsError::Timeout));
        assert_eq!(err.errno, errno::SERVICE_UNAVAILABLE);
        assert_eq!(err.kind(), "synthesis_failed");
    }

    #[test]
    fn test_cancelled_flag_carried() {
        let err = ApiError::from(ApplicationError::from(TtsError::Cancelled));
        assert!(err.cancelled);
        assert_eq!(err.kind(), "cancelled");
    }
}
