//! alphadesk research-desk job runner.
//!
//! Wires the session together:
//! - HTTP clients for the credit ledger, job store, and workflow engine
//! - the in-process change-feed hub, fed by a polling bridge
//! - the orchestration core (latch, simulator, lifecycle store)
//! - the notification center consuming lifecycle events

pub mod app;
pub mod config;
pub mod error;
pub mod feed_bridge;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
