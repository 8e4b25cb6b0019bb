//! Clock Sink - 按时长计时的音频输出
//!
//! 服务端没有实际发声设备，播放语义由挂钟实现：从 WAV 头算出
//! 缓冲区时长，等待同样长的时间后回报"播完"。客户端通过音频
//! 接口取字节自行回放，会话的推进节奏由这里保证。

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AudioSinkPort, PlaybackOutcome, SinkError};

/// 挂钟音源
#[derive(Debug, Default)]
pub struct ClockSink;

impl ClockSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioSinkPort for ClockSink {
    async fn play(
        &self,
        audio: &[u8],
        cancel: &CancellationToken,
    ) -> Result<PlaybackOutcome, SinkError> {
        let duration = wav_duration(audio).map_err(SinkError::Unplayable)?;
        tracing::trace!(duration_ms = duration.as_millis() as u64, "Clock playback started");

        tokio::select! {
            _ = cancel.cancelled() => Ok(PlaybackOutcome::Interrupted),
            _ = tokio::time::sleep(duration) => Ok(PlaybackOutcome::Completed),
        }
    }
}

/// 从 WAV 头解析缓冲区时长
///
/// 遍历 RIFF chunk 找 fmt 与 data，时长 = data 大小 / 字节率
fn wav_duration(data: &[u8]) -> Result<Duration, String> {
    if data.len() < 44 {
        return Err("WAV data too short".to_string());
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err("missing RIFF/WAVE header".to_string());
    }

    let mut pos = 12;
    let mut byte_rate: Option<u32> = None;
    let mut data_size: Option<usize> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                as usize;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 || pos + 8 + 16 > data.len() {
                    return Err("invalid fmt chunk".to_string());
                }
                let fmt = &data[pos + 8..pos + 24];
                byte_rate = Some(u32::from_le_bytes([fmt[8], fmt[9], fmt[10], fmt[11]]));
            }
            b"data" => {
                data_size = Some(chunk_size);
                break;
            }
            _ => {}
        }

        pos += 8 + chunk_size;
        // chunk 按偶数字节对齐
        if chunk_size % 2 != 0 {
            pos += 1;
        }
    }

    let byte_rate = byte_rate.ok_or_else(|| "missing fmt chunk".to_string())?;
    let data_size = data_size.ok_or_else(|| "missing data chunk".to_string())?;
    if byte_rate == 0 {
        return Err("zero byte rate".to_string());
    }

    let millis = (data_size as u64 * 1000) / byte_rate as u64;
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::tts::silent_wav;

    #[test]
    fn test_duration_from_generated_wav() {
        let wav = silent_wav(1000, 22050);
        let duration = wav_duration(&wav).unwrap();
        assert!(duration >= Duration::from_millis(990) && duration <= Duration::from_millis(1010));
    }

    #[test]
    fn test_garbage_input_rejected() {
        assert!(wav_duration(b"not audio at all").is_err());
        assert!(wav_duration(&[0u8; 100]).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_playback_reports_interrupted() {
        let sink = ClockSink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = sink.play(&silent_wav(5000, 22050), &cancel).await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Interrupted);
    }

    #[tokio::test]
    async fn test_short_buffer_completes() {
        let sink = ClockSink::new();
        let outcome = sink
            .play(&silent_wav(5, 8000), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed);
    }
}
