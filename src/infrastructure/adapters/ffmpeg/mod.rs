//! FFmpeg 工具链适配器

mod pipeline;

pub use pipeline::{FfmpegPipeline, FfmpegPipelineConfig};
