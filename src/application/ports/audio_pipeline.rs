//! Audio Pipeline Port - 外部转码工具链抽象
//!
//! 容器解析与编解码全部委托给外部子进程（转码、测长、封装三步），
//! 本端口只约定三步的输入输出与错误语义。子进程非零退出一律为硬失败，
//! 本层不做重试。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 工具链错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 导出请求被取消
    #[error("pipeline step cancelled")]
    Cancelled,

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Mux failed: {0}")]
    MuxFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl PipelineError {
    /// 机器可读的错误类别，进 HTTP 错误封套
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Cancelled => "cancelled",
            PipelineError::TranscodeFailed(_) => "transcode_failed",
            PipelineError::ProbeFailed(_) => "probe_failed",
            PipelineError::MuxFailed(_) => "mux_failed",
            PipelineError::IoError(_) => "io_error",
        }
    }
}

/// 导出容器格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// MPEG-4 有声书容器，章节标记原生支持
    #[default]
    M4b,
    /// MP3，拼接后章节标记不随容器保留
    Mp3,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::M4b => "audio/mp4",
            ExportFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::M4b => "m4b",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m4b" | "m4a" => Ok(ExportFormat::M4b),
            "mp3" => Ok(ExportFormat::Mp3),
            other => Err(format!("unsupported export format: {}", other)),
        }
    }
}

/// 规范中间格式参数
///
/// 所有章节先统一到同一 PCM 规格（16 位定长采样），
/// 避免异构来源在拼接时产生时间戳漂移
#[derive(Debug, Clone)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub channels: u8,
}

impl Default for PcmSpec {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
        }
    }
}

/// Audio Pipeline Port
#[async_trait]
pub trait AudioPipelinePort: Send + Sync {
    /// 任意输入容器 → 固定规格 PCM WAV
    async fn transcode_to_pcm(
        &self,
        input: &Path,
        output: &Path,
        spec: &PcmSpec,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError>;

    /// 测量文件精确时长（秒）
    async fn probe_duration(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<f64, PipelineError>;

    /// 按拼接清单合并所有章节，内嵌章节元数据，产出单一容器文件
    async fn mux_chapters(
        &self,
        concat_list: &Path,
        metadata: &Path,
        output: &Path,
        format: ExportFormat,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_round_trip() {
        assert_eq!(ExportFormat::from_str("m4b").unwrap(), ExportFormat::M4b);
        assert_eq!(ExportFormat::from_str("MP3").unwrap(), ExportFormat::Mp3);
        assert!(ExportFormat::from_str("ogg").is_err());
    }

    #[test]
    fn test_content_types() {
        assert_eq!(ExportFormat::M4b.content_type(), "audio/mp4");
        assert_eq!(ExportFormat::Mp3.content_type(), "audio/mpeg");
    }

    #[test]
    fn test_error_kinds_are_stable() {
        assert_eq!(
            PipelineError::TranscodeFailed("x".into()).kind(),
            "transcode_failed"
        );
        assert_eq!(PipelineError::MuxFailed("x".into()).kind(), "mux_failed");
        assert_eq!(PipelineError::Cancelled.kind(), "cancelled");
    }
}
