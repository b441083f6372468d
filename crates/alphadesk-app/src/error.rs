//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] alphadesk_gateway::GatewayError),

    #[error("Submit error: {0}")]
    Submit(#[from] alphadesk_jobs::SubmitError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] alphadesk_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
