// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod models;
pub mod position;
pub mod server;

// Re-export commonly used types
pub use error::BotError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
