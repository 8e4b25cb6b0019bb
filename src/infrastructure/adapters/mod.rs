//! Infrastructure Adapters - 端口的具体实现

pub mod ffmpeg;
pub mod sink;
pub mod tts;

pub use ffmpeg::{FfmpegPipeline, FfmpegPipelineConfig};
pub use sink::ClockSink;
pub use tts::{FakeTtsClient, FakeTtsClientConfig, HttpTtsClient, HttpTtsClientConfig};
