//! HTTP 基础设施

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use server::HttpServer;
pub use state::AppState;
