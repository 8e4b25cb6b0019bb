//! 应用层错误定义
//!
//! 统一的服务层错误类型，HTTP 层据此映射错误封套

use thiserror::Error;

use super::ports::{PipelineError, TtsError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 输入无效（空文本、缺章节等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 会话不存在或已过期
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// 合成后端错误
    #[error(transparent)]
    Synthesis(#[from] TtsError),

    /// 外部工具链错误
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// 存储/文件系统错误
    #[error("Storage error: {0}")]
    StorageError(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }

    /// 是否由取消引起（取消不算失败，不进 error 日志）
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ApplicationError::Synthesis(TtsError::Cancelled)
                | ApplicationError::Pipeline(PipelineError::Cancelled)
        )
    }

    /// 机器可读错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            ApplicationError::InvalidInput(_) => "invalid_input",
            ApplicationError::SessionNotFound(_) => "session_not_found",
            ApplicationError::Synthesis(TtsError::Cancelled) => "cancelled",
            ApplicationError::Synthesis(_) => "synthesis_failed",
            ApplicationError::Pipeline(e) => e.kind(),
            ApplicationError::StorageError(_) => "storage_error",
            ApplicationError::InternalError(_) => "internal_error",
        }
    }
}

impl From<std::io::Error> for ApplicationError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ApplicationError::invalid_input("empty").kind(),
            "invalid_input"
        );
        assert_eq!(
            ApplicationError::from(TtsError::Timeout).kind(),
            "synthesis_failed"
        );
        assert_eq!(
            ApplicationError::from(PipelineError::MuxFailed("x".into())).kind(),
            "mux_failed"
        );
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(ApplicationError::from(TtsError::Cancelled).is_cancelled());
        assert!(ApplicationError::from(PipelineError::Cancelled).is_cancelled());
        assert!(!ApplicationError::invalid_input("x").is_cancelled());
    }
}
