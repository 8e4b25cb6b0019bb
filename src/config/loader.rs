//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `LECTERN_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `LECTERN_SERVER__PORT=8080`
/// - `LECTERN_TTS__BASE_URL=http://tts-server:8880`
/// - `LECTERN_PLAYBACK__MAX_BLOCK_CHARS=400`
/// - `LECTERN_EXPORT__FFMPEG_BIN=/usr/local/bin/ffmpeg`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5870)?
        .set_default("server.max_body_bytes", 200 * 1024 * 1024_i64)?
        .set_default("tts.base_url", "http://localhost:8880")?
        .set_default("tts.timeout_secs", 120)?
        .set_default("tts.max_attempts", 3)?
        .set_default("tts.initial_backoff_ms", 500)?
        .set_default("tts.max_backoff_ms", 8000)?
        .set_default("playback.max_block_chars", 300)?
        .set_default("playback.cache_capacity", 50)?
        .set_default("playback.prefetch_delay_ms", 250)?
        .set_default("playback.default_voice", "alloy")?
        .set_default("playback.default_speed", 1.0)?
        .set_default("export.sample_rate", 44100)?
        .set_default("export.channels", 1)?
        .set_default("export.bitrate_kbps", 64)?
        .set_default("export.ffmpeg_bin", "ffmpeg")?
        .set_default("export.ffprobe_bin", "ffprobe")?
        .set_default("session.sweep_enabled", true)?
        .set_default("session.sweep_interval_secs", 300)?
        .set_default("session.idle_timeout_secs", 1800)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: LECTERN_，层级分隔符: __ (双下划线)
    // 例如: LECTERN_TTS__BASE_URL=http://tts-server:8880
    builder = builder.add_source(
        Environment::with_prefix("LECTERN")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.tts.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "TTS base URL cannot be empty".to_string(),
        ));
    }

    if config.tts.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "TTS max_attempts must be at least 1".to_string(),
        ));
    }

    if config.playback.max_block_chars == 0 {
        return Err(ConfigError::ValidationError(
            "Playback max_block_chars cannot be 0".to_string(),
        ));
    }

    if config.playback.cache_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "Playback cache_capacity cannot be 0".to_string(),
        ));
    }

    if config.export.sample_rate == 0 {
        return Err(ConfigError::ValidationError(
            "Export sample_rate cannot be 0".to_string(),
        ));
    }

    if !(1..=2).contains(&config.export.channels) {
        return Err(ConfigError::ValidationError(
            "Export channels must be 1 or 2".to_string(),
        ));
    }

    if config.session.sweep_enabled && config.session.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Session sweep interval cannot be 0 when sweeping is enabled".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("TTS Base URL: {}", config.tts.base_url);
    tracing::info!("TTS Timeout: {}s", config.tts.timeout_secs);
    tracing::info!(
        "TTS Export Retry: {} attempts, {}ms..{}ms backoff",
        config.tts.max_attempts,
        config.tts.initial_backoff_ms,
        config.tts.max_backoff_ms
    );
    tracing::info!(
        "Playback: {} chars/block, cache {} entries, prefetch delay {}ms",
        config.playback.max_block_chars,
        config.playback.cache_capacity,
        config.playback.prefetch_delay_ms
    );
    tracing::info!(
        "Export: {} Hz, {} ch, {} kbps ({} / {})",
        config.export.sample_rate,
        config.export.channels,
        config.export.bitrate_kbps,
        config.export.ffmpeg_bin,
        config.export.ffprobe_bin
    );
    tracing::info!("Session Sweep Enabled: {}", config.session.sweep_enabled);
    if config.session.sweep_enabled {
        tracing::info!(
            "Session Sweep: every {}s, idle timeout {}s",
            config.session.sweep_interval_secs,
            config.session.idle_timeout_secs
        );
    }
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_passes_for_default_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_tts_url() {
        let mut config = AppConfig::default();
        config.tts.base_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_cache_capacity() {
        let mut config = AppConfig::default();
        config.playback.cache_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_bad_channel_count() {
        let mut config = AppConfig::default();
        config.export.channels = 6;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_retry_attempts() {
        let mut config = AppConfig::default();
        config.tts.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9999\n\n[playback]\nmax_block_chars = 450\n",
        )
        .unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.playback.max_block_chars, 450);
        // 未覆盖的仍是默认值
        assert_eq!(config.playback.cache_capacity, 50);
    }
}
