//! Shared modules for the PostgreSQL MCP query gateway.

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use config::{DatabaseTarget, GatewayConfig};
pub use errors::{AppError, AppResult};
