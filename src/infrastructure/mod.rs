//! Infrastructure Layer - 基础设施层
//!
//! - adapters: TTS 客户端、FFmpeg 工具链、音频输出
//! - http: RESTful API
//! - memory: 会话注册表

pub mod adapters;
pub mod http;
pub mod memory;
