//! Error types for alphadesk-jobs.

use alphadesk_core::Feature;
use alphadesk_gateway::GatewayError;
use thiserror::Error;

/// Errors surfaced synchronously to the submitter.
///
/// These are the admission failures; everything that happens after a job
/// is admitted is absorbed by the resolver/latch machinery and surfaced
/// through lifecycle events instead.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("No {credit_type} credits available for {feature}")]
    CreditsExhausted {
        feature: Feature,
        credit_type: alphadesk_core::CreditType,
        available: Option<u64>,
    },

    #[error("Failed to persist job record: {0}")]
    Store(#[source] GatewayError),

    #[error("Credit reservation call failed: {0}")]
    Reservation(#[source] GatewayError),
}
