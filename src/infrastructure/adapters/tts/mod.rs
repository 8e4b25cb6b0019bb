//! TTS 适配器

mod fake_tts_client;
mod http_tts_client;

pub use fake_tts_client::{silent_wav, FakeTtsClient, FakeTtsClientConfig};
pub use http_tts_client::{HttpTtsClient, HttpTtsClientConfig};
