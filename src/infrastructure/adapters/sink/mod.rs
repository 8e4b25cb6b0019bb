//! 音频输出适配器

mod clock_sink;

pub use clock_sink::ClockSink;
