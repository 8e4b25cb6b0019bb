//! FFmpeg Pipeline - 外部工具链适配器
//!
//! 用 ffmpeg/ffprobe 子进程完成三步工具链：
//! - transcode: 任意输入容器 → 固定规格 PCM WAV（s16le）
//! - probe: 测量文件精确时长（秒，单个浮点）
//! - mux: concat 清单 + 章节元数据 → 单一容器，faststart 布局
//!
//! 子进程对调用方任务而言是阻塞语义：spawn 后等待退出码并收集
//! 输出。进程带 kill_on_drop，取消或调用方 future 被丢弃时进程
//! 随之终止。非零退出一律硬失败，错误携带 stderr 末尾便于定位。

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AudioPipelinePort, ExportFormat, PcmSpec, PipelineError};

/// 错误信息里保留的 stderr 尾部长度
const STDERR_TAIL_CHARS: usize = 400;

/// FFmpeg 工具链配置
#[derive(Debug, Clone)]
pub struct FfmpegPipelineConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// 封装产物的目标比特率（kbps）
    pub bitrate_kbps: u32,
}

impl Default for FfmpegPipelineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            bitrate_kbps: 64,
        }
    }
}

/// FFmpeg 工具链
pub struct FfmpegPipeline {
    config: FfmpegPipelineConfig,
}

impl FfmpegPipeline {
    pub fn new(config: FfmpegPipelineConfig) -> Self {
        Self { config }
    }

    /// 运行子进程至退出，收集 stdout/stderr
    ///
    /// cancel 触发时丢弃等待中的 future，kill_on_drop 随即杀掉进程
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<std::process::Output, PipelineError> {
        tracing::debug!(program = program, args = ?args, "Spawning subprocess");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::IoError(format!("failed to spawn {}: {}", program, e)))?;

        tokio::select! {
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            output = child.wait_with_output() => {
                output.map_err(|e| PipelineError::IoError(format!("{} wait failed: {}", program, e)))
            }
        }
    }
}

impl Default for FfmpegPipeline {
    fn default() -> Self {
        Self::new(FfmpegPipelineConfig::default())
    }
}

#[async_trait]
impl AudioPipelinePort for FfmpegPipeline {
    async fn transcode_to_pcm(
        &self,
        input: &Path,
        output: &Path,
        spec: &PcmSpec,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let args = transcode_args(input, output, spec);
        let result = self.run(&self.config.ffmpeg_bin, &args, cancel).await?;

        if !result.status.success() {
            return Err(PipelineError::TranscodeFailed(describe_failure(&result)));
        }
        if !output.exists() {
            return Err(PipelineError::TranscodeFailed(
                "transcode produced no output file".to_string(),
            ));
        }
        Ok(())
    }

    async fn probe_duration(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<f64, PipelineError> {
        let args = probe_args(path);
        let result = self.run(&self.config.ffprobe_bin, &args, cancel).await?;

        if !result.status.success() {
            return Err(PipelineError::ProbeFailed(describe_failure(&result)));
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        parse_probe_duration(&stdout)
    }

    async fn mux_chapters(
        &self,
        concat_list: &Path,
        metadata: &Path,
        output: &Path,
        format: ExportFormat,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let args = mux_args(concat_list, metadata, output, format, self.config.bitrate_kbps);
        let result = self.run(&self.config.ffmpeg_bin, &args, cancel).await?;

        if !result.status.success() {
            return Err(PipelineError::MuxFailed(describe_failure(&result)));
        }
        if !output.exists() {
            return Err(PipelineError::MuxFailed(
                "mux produced no output file".to_string(),
            ));
        }
        Ok(())
    }
}

fn transcode_args(input: &Path, output: &Path, spec: &PcmSpec) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.display().to_string(),
        "-ar".into(),
        spec.sample_rate.to_string(),
        "-ac".into(),
        spec.channels.to_string(),
        "-c:a".into(),
        "pcm_s16le".into(),
        output.display().to_string(),
    ]
}

fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.display().to_string(),
    ]
}

fn mux_args(
    concat_list: &Path,
    metadata: &Path,
    output: &Path,
    format: ExportFormat,
    bitrate_kbps: u32,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        concat_list.display().to_string(),
        "-i".into(),
        metadata.display().to_string(),
        "-map_metadata".into(),
        "1".into(),
        "-map".into(),
        "0:a".into(),
    ];

    match format {
        ExportFormat::M4b => {
            args.extend([
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                format!("{}k", bitrate_kbps),
                // faststart 把索引挪到文件头，边下边播
                "-movflags".into(),
                "+faststart".into(),
                "-f".into(),
                "mp4".into(),
            ]);
        }
        ExportFormat::Mp3 => {
            args.extend([
                "-c:a".into(),
                "libmp3lame".into(),
                "-b:a".into(),
                format!("{}k", bitrate_kbps),
                "-id3v2_version".into(),
                "3".into(),
            ]);
        }
    }

    args.push(output.display().to_string());
    args
}

/// 解析 ffprobe 输出的单个浮点秒数
fn parse_probe_duration(stdout: &str) -> Result<f64, PipelineError> {
    let value: f64 = stdout
        .trim()
        .parse()
        .map_err(|_| PipelineError::ProbeFailed(format!("unparsable duration: {:?}", stdout.trim())))?;

    if !value.is_finite() || value < 0.0 {
        return Err(PipelineError::ProbeFailed(format!(
            "implausible duration: {}",
            value
        )));
    }
    Ok(value)
}

/// 退出码 + stderr 尾部，拼成可定位的失败描述
fn describe_failure(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let tail: String = stderr
        .chars()
        .rev()
        .take(STDERR_TAIL_CHARS)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{}: {}", output.status, tail.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_transcode_args_pin_canonical_format() {
        let args = transcode_args(
            &PathBuf::from("/w/raw_0000.bin"),
            &PathBuf::from("/w/chapter_0000.wav"),
            &PcmSpec {
                sample_rate: 44100,
                channels: 1,
            },
        );
        let joined = args.join(" ");
        assert!(joined.contains("-ar 44100"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-c:a pcm_s16le"));
        assert!(joined.contains("-y"));
        assert!(joined.ends_with("/w/chapter_0000.wav"));
    }

    #[test]
    fn test_probe_args_request_bare_duration() {
        let args = probe_args(&PathBuf::from("/w/chapter_0000.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("format=duration"));
        assert!(joined.contains("noprint_wrappers=1:nokey=1"));
    }

    #[test]
    fn test_mux_args_m4b_uses_faststart() {
        let args = mux_args(
            &PathBuf::from("/w/concat.txt"),
            &PathBuf::from("/w/chapters.ffmeta"),
            &PathBuf::from("/w/audiobook.m4b"),
            ExportFormat::M4b,
            64,
        );
        let joined = args.join(" ");
        assert!(joined.contains("-f concat"));
        assert!(joined.contains("-map_metadata 1"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("-b:a 64k"));
    }

    #[test]
    fn test_mux_args_mp3_uses_lame() {
        let args = mux_args(
            &PathBuf::from("/w/concat.txt"),
            &PathBuf::from("/w/chapters.ffmeta"),
            &PathBuf::from("/w/audiobook.mp3"),
            ExportFormat::Mp3,
            48,
        );
        let joined = args.join(" ");
        assert!(joined.contains("libmp3lame"));
        assert!(joined.contains("-b:a 48k"));
        assert!(!joined.contains("faststart"));
    }

    #[test]
    fn test_parse_probe_duration() {
        assert_eq!(parse_probe_duration("12.345\n").unwrap(), 12.345);
        assert_eq!(parse_probe_duration("0").unwrap(), 0.0);
        assert!(parse_probe_duration("N/A").is_err());
        assert!(parse_probe_duration("-1.5").is_err());
        assert!(parse_probe_duration("").is_err());
    }
}
