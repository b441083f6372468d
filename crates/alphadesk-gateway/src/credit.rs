//! Credit ledger client.
//!
//! Wraps the atomic "try engage credit" operation. The ledger itself keys
//! the reservation by job id, so a retried call for the same id does not
//! double-charge.

use crate::error::{GatewayError, GatewayResult};
use alphadesk_core::{CreditType, JobId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Request body for the engage endpoint.
#[derive(Debug, Serialize)]
struct EngageRequest {
    credit_type: CreditType,
    job_id: JobId,
}

/// Outcome of a reservation attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditReservation {
    pub success: bool,
    /// Remaining balance for the charged credit type, when the ledger
    /// reports it.
    #[serde(default)]
    pub available: Option<u64>,
}

/// Client for the credit ledger.
#[derive(Debug, Clone)]
pub struct CreditClient {
    client: Client,
    engage_url: String,
}

impl CreditClient {
    /// Create a client from the ledger base URL.
    pub fn new(client: Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            engage_url: format!("{}/credits/engage", base_url.as_ref().trim_end_matches('/')),
        }
    }

    /// Attempt to reserve one credit of `credit_type` for `job_id`.
    ///
    /// Must be called before the job is considered valid for processing.
    /// On `success: false` the caller is responsible for the compensating
    /// delete of the just-inserted job row.
    pub async fn try_engage(
        &self,
        credit_type: CreditType,
        job_id: JobId,
    ) -> GatewayResult<CreditReservation> {
        debug!(%job_id, %credit_type, "Engaging credit");

        let request = EngageRequest {
            credit_type,
            job_id,
        };

        let response = self
            .client
            .post(&self.engage_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Credit engage failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reservation: CreditReservation = response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(format!("Credit engage response: {e}")))?;

        info!(
            %job_id,
            %credit_type,
            success = reservation.success,
            available = ?reservation.available,
            "Credit reservation result"
        );

        Ok(reservation)
    }
}
