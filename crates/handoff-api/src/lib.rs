//! Handoff API Library
//!
//! HTTP and WebSocket surface of the session lifecycle engine: handlers,
//! authentication, the real-time hub and application setup.

pub mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;
pub mod views;

pub use error::ErrorResponse;
pub use hub::{EventSink, Hub};
pub use services::SessionService;
pub use state::AppState;
