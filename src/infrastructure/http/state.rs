//! Application State

use std::sync::Arc;

use crate::application::ports::{AudioSinkPort, TtsEnginePort};
use crate::application::AudiobookAssembler;
use crate::config::AppConfig;
use crate::infrastructure::memory::SessionRegistry;

/// 应用状态
///
/// 所有 handler 共享：配置、会话注册表、端口实现与装配器
pub struct AppState {
    pub config: AppConfig,
    pub sessions: Arc<SessionRegistry>,
    pub tts_engine: Arc<dyn TtsEnginePort>,
    pub audio_sink: Arc<dyn AudioSinkPort>,
    pub assembler: Arc<AudiobookAssembler>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        sessions: Arc<SessionRegistry>,
        tts_engine: Arc<dyn TtsEnginePort>,
        audio_sink: Arc<dyn AudioSinkPort>,
        assembler: Arc<AudiobookAssembler>,
    ) -> Self {
        Self {
            config,
            sessions,
            tts_engine,
            audio_sink,
            assembler,
        }
    }
}
