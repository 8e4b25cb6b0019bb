//! HTTP Handlers

mod audio;
mod export;
mod ping;
mod session;
mod voice;

pub use audio::get_audio;
pub use export::{export_audiobook, export_text};
pub use ping::ping;
pub use session::{
    close_session, jump_to, open_session, skip_backward, skip_forward, status, stop, toggle_play,
};
pub use voice::list_voices;
