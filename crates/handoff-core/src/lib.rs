//! Handoff Core Library
//!
//! This crate provides the domain models, error types and configuration
//! shared by the store, the processing pipeline, the API server and the client.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{parse_duration, Config};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::*;
