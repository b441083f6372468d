//! Workflow-engine proxy client.
//!
//! Issues the triggering POST for a job. The response may carry the final
//! result directly, or only an acknowledgement while the real result
//! arrives later through the change feed; the resolver decides what to do
//! with whatever comes back.

use crate::envelope::extract_result;
use crate::error::{GatewayError, GatewayResult};
use alphadesk_core::TriggerRequest;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Default timeout for API requests.
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Outcome of the triggering POST.
#[derive(Debug, Clone)]
pub struct TriggerReply {
    /// Whether the HTTP exchange itself succeeded (2xx).
    pub ok: bool,
    /// HTTP status code.
    pub status: u16,
    /// Raw JSON body, when one could be read.
    pub body: Option<Value>,
}

impl TriggerReply {
    /// Extract the analysis result from the body via the ordered
    /// envelope paths. `None` means there is nothing usable in this reply
    /// and the resolver should wait on the change feed instead.
    pub fn result(&self) -> Option<Value> {
        if !self.ok {
            return None;
        }
        self.body.as_ref().and_then(extract_result)
    }
}

/// Client for the workflow-engine proxy.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: Client,
    trigger_url: String,
}

impl EngineClient {
    /// Create a client from the proxy URL.
    ///
    /// The shared `reqwest::Client` should carry a request timeout; the
    /// engine can legitimately hold the request open for a long time, and
    /// a timed-out trigger is not fatal (the change-feed path remains live).
    pub fn new(client: Client, trigger_url: impl Into<String>) -> Self {
        Self {
            client,
            trigger_url: trigger_url.into(),
        }
    }

    /// Build a client with its own long-poll-friendly HTTP client.
    pub fn with_timeout(
        trigger_url: impl Into<String>,
        timeout: std::time::Duration,
    ) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self::new(client, trigger_url))
    }

    /// Issue the triggering POST for a job.
    ///
    /// Only transport-level failures return `Err`; a non-2xx status is a
    /// normal `TriggerReply` with `ok: false`, since the backend may still
    /// complete the job server-side.
    pub async fn trigger(&self, request: &TriggerRequest) -> GatewayResult<TriggerReply> {
        info!(job_id = %request.job_id, feature = %request.feature, "Triggering analysis");

        let response = self
            .client
            .post(&self.trigger_url)
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Trigger request failed: {e}")))?;

        let status = response.status();
        let ok = status.is_success();

        let body = match response.json::<Value>().await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(job_id = %request.job_id, error = %e, "Trigger body not JSON");
                None
            }
        };

        Ok(TriggerReply {
            ok,
            status: status.as_u16(),
            body,
        })
    }
}
