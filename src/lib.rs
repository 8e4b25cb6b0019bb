//! Lectern - 文档朗读与有声书导出服务
//!
//! 把书面文档变成语音：分块 → 外部合成 → 交互播放（播放/暂停/
//! 跳块/定位），以及整书批量导出为带章节标记的有声书容器。
//!
//! 架构分层: Hexagonal (Ports & Adapters)
//!
//! 领域层 (domain/):
//! - segmenter: 文本清洗与分块（纯函数）
//! - playback: 播放状态机（纯转移函数）
//! - timeline: 章节时间轴与元数据文档
//!
//! 应用层 (application/):
//! - Ports: TtsEnginePort, AudioSinkPort, AudioPipelinePort
//! - playback: 会话控制器（缓存、预取、逐代取消）
//! - export: 有声书装配器（串行工具链、流式产物、作用域清理）
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API（会话控制、音频读取、音色清单、导出）
//! - Adapters: HTTP/Fake TTS 客户端、FFmpeg 工具链、时钟音源
//! - Memory: 会话注册表与闲置回收

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
