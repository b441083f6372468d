//! Error types for alphadesk-gateway.

use thiserror::Error;

/// Gateway error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;
