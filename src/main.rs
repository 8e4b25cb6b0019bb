//! Lectern - 文档朗读与有声书导出服务
//!
//! 组装顺序: 配置 → 日志 → 端口适配器 → 会话注册表 → HTTP 服务

use std::sync::Arc;
use std::time::Duration;

use lectern::application::ports::{PcmSpec, TtsEnginePort};
use lectern::application::{AssemblerConfig, AudiobookAssembler};
use lectern::config::{load_config, print_config};
use lectern::infrastructure::adapters::{
    ClockSink, FfmpegPipeline, FfmpegPipelineConfig, HttpTtsClient, HttpTtsClientConfig,
};
// use lectern::infrastructure::adapters::{FakeTtsClient, FakeTtsClientConfig};
use lectern::infrastructure::http::{AppState, HttpServer};
use lectern::infrastructure::memory::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    // 初始化日志
    let log_filter = format!(
        "{},lectern={},tower_http=debug",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .init();

    tracing::info!("Lectern - 文档朗读与有声书导出服务");
    print_config(&config);

    // 创建 HTTP TTS 引擎
    let tts_config = HttpTtsClientConfig {
        base_url: config.tts.base_url.clone(),
        timeout_secs: config.tts.timeout_secs,
        api_key: config.tts.api_key.clone(),
    };
    let tts_engine = Arc::new(HttpTtsClient::new(tts_config)?);

    // // 本地联调用的假引擎（固定时长静音，不依赖外部服务）
    // let tts_engine = Arc::new(FakeTtsClient::new(FakeTtsClientConfig::default()));

    if !tts_engine.health_check().await {
        tracing::warn!(
            base_url = %config.tts.base_url,
            "Synthesis backend unreachable at startup, continuing anyway"
        );
    }

    // 时钟音源：按 WAV 时长推进会话节奏
    let audio_sink = Arc::new(ClockSink::new());

    // FFmpeg 工具链与装配器
    let pipeline = Arc::new(FfmpegPipeline::new(FfmpegPipelineConfig {
        ffmpeg_bin: config.export.ffmpeg_bin.clone(),
        ffprobe_bin: config.export.ffprobe_bin.clone(),
        bitrate_kbps: config.export.bitrate_kbps,
    }));
    let assembler = Arc::new(AudiobookAssembler::new(
        pipeline,
        tts_engine.clone(),
        AssemblerConfig {
            pcm: PcmSpec {
                sample_rate: config.export.sample_rate,
                channels: config.export.channels,
            },
            retry: config.tts.retry_policy(),
            work_dir: config.export.work_dir.clone(),
        },
    ));

    // 会话注册表 + 闲置回收
    let sessions = Arc::new(SessionRegistry::new());
    if config.session.sweep_enabled {
        sessions.start_expiry_sweep(
            Duration::from_secs(config.session.sweep_interval_secs),
            Duration::from_secs(config.session.idle_timeout_secs),
        );
    }

    // 创建 HTTP 服务器
    let server_config = config.server.clone();
    let state = AppState::new(
        config,
        sessions,
        tts_engine,
        audio_sink,
        assembler,
    );

    let server = HttpServer::new(server_config, state);

    tracing::info!("Starting HTTP server...");

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to listen for ctrl-c");
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
