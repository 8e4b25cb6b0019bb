//! 内存态注册表

mod session_registry;

pub use session_registry::{SessionError, SessionRegistry};
