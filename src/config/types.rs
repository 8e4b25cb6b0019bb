//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成后端配置
    #[serde(default)]
    pub tts: TtsConfig,

    /// 交互播放配置
    #[serde(default)]
    pub playback: PlaybackConfig,

    /// 导出配置
    #[serde(default)]
    pub export: ExportConfig,

    /// 会话回收配置
    #[serde(default)]
    pub session: SessionConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 请求体大小上限（字节），约束章节上传
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5870
}

fn default_max_body_bytes() -> usize {
    200 * 1024 * 1024 // 200 MB，整本书的章节音频
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 合成后端配置
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    /// 合成服务基础 URL
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// 服务端兜底 API key（调用方随请求传的优先）
    #[serde(default)]
    pub api_key: Option<String>,

    /// 导出路径合成重试：总尝试次数上限
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// 重试初始退避（毫秒）
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// 重试退避封顶（毫秒）
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_tts_base_url() -> String {
    "http://localhost:8880".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_base_url(),
            timeout_secs: default_tts_timeout(),
            api_key: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl TtsConfig {
    /// 导出路径的重试策略
    pub fn retry_policy(&self) -> crate::application::ports::RetryPolicy {
        crate::application::ports::RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: std::time::Duration::from_millis(self.initial_backoff_ms),
            max_backoff: std::time::Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// 交互播放配置
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// 单块最大字符数
    #[serde(default = "default_max_block_chars")]
    pub max_block_chars: usize,

    /// 每会话音频缓存容量（条目数）
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// 预取下一块前的等待（毫秒）
    #[serde(default = "default_prefetch_delay_ms")]
    pub prefetch_delay_ms: u64,

    /// 默认音色
    #[serde(default = "default_voice")]
    pub default_voice: String,

    /// 默认语速
    #[serde(default = "default_speed")]
    pub default_speed: f32,
}

fn default_max_block_chars() -> usize {
    300
}

fn default_cache_capacity() -> usize {
    50
}

fn default_prefetch_delay_ms() -> u64 {
    250
}

fn default_voice() -> String {
    "alloy".to_string()
}

fn default_speed() -> f32 {
    1.0
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_block_chars: default_max_block_chars(),
            cache_capacity: default_cache_capacity(),
            prefetch_delay_ms: default_prefetch_delay_ms(),
            default_voice: default_voice(),
            default_speed: default_speed(),
        }
    }
}

/// 导出配置
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// 规范 PCM 采样率（Hz）
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// 规范 PCM 声道数
    #[serde(default = "default_channels")]
    pub channels: u8,

    /// 封装产物比特率（kbps）
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,

    /// 工作目录父路径，不设置用系统临时目录
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// 外部工具路径
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,

    #[serde(default = "default_ffprobe_bin")]
    pub ffprobe_bin: String,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u8 {
    1 // 单声道，朗读内容足够
}

fn default_bitrate_kbps() -> u32 {
    64
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_bin() -> String {
    "ffprobe".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bitrate_kbps: default_bitrate_kbps(),
            work_dir: None,
            ffmpeg_bin: default_ffmpeg_bin(),
            ffprobe_bin: default_ffprobe_bin(),
        }
    }
}

/// 会话回收配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 是否启用闲置清扫
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,

    /// 清扫间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// 会话闲置超时（秒）
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300 // 5 分钟
}

fn default_idle_timeout() -> u64 {
    1800 // 30 分钟
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_enabled: default_sweep_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5870);
        assert_eq!(config.tts.base_url, "http://localhost:8880");
        assert_eq!(config.playback.max_block_chars, 300);
        assert_eq!(config.playback.cache_capacity, 50);
        assert_eq!(config.export.sample_rate, 44100);
        assert_eq!(config.export.channels, 1);
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5870");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = TtsConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff.as_millis(), 500);
        assert_eq!(policy.max_backoff.as_millis(), 8000);
    }
}
