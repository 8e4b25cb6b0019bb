//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_pipeline;
mod audio_sink;
mod tts_engine;

pub use audio_pipeline::{AudioPipelinePort, ExportFormat, PcmSpec, PipelineError};
pub use audio_sink::{AudioSinkPort, PlaybackOutcome, SinkError};
pub use tts_engine::{
    RetryPolicy, SynthesisRequest, TtsCredentials, TtsEnginePort, TtsError, DEFAULT_VOICES,
};
