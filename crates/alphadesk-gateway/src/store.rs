//! Job record store client.
//!
//! The store is a dumb append/patch/delete record keeper keyed by job id.
//! It never enforces the status state machine; the lifecycle store does
//! that when interpreting change events.

use crate::error::{GatewayError, GatewayResult};
use alphadesk_core::{JobId, JobRow, JobStatus, UserId};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Partial update of a job row. Only set fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            progress_message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Client for the persisted job table.
#[derive(Debug, Clone)]
pub struct JobStoreClient {
    client: Client,
    jobs_url: String,
}

impl JobStoreClient {
    /// Create a client from the store base URL.
    pub fn new(client: Client, base_url: impl AsRef<str>) -> Self {
        Self {
            client,
            jobs_url: format!("{}/jobs", base_url.as_ref().trim_end_matches('/')),
        }
    }

    fn row_url(&self, id: JobId) -> String {
        format!("{}/{id}", self.jobs_url)
    }

    /// Insert a new row. Returns the id the store acknowledged.
    pub async fn insert(&self, row: &JobRow) -> GatewayResult<JobId> {
        debug!(job_id = %row.id, feature = %row.feature, "Inserting job row");

        let response = self
            .client
            .post(&self.jobs_url)
            .json(row)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Job insert failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(row.id)
    }

    /// Patch an existing row with the set fields only.
    pub async fn patch(&self, id: JobId, patch: &JobPatch) -> GatewayResult<()> {
        debug!(job_id = %id, ?patch, "Patching job row");

        let response = self
            .client
            .patch(self.row_url(id))
            .json(patch)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Job patch failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// Delete a row. Deleting an already-absent row is not an error, which
    /// keeps the compensating delete idempotent under retry.
    pub async fn delete(&self, id: JobId) -> GatewayResult<()> {
        debug!(job_id = %id, "Deleting job row");

        let response = self
            .client
            .delete(self.row_url(id))
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Job delete failed: {e}")))?;

        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    /// List all rows owned by a user. Used by the polling feed bridge.
    pub async fn list_for_user(&self, user_id: &UserId) -> GatewayResult<Vec<JobRow>> {
        let response = self
            .client
            .get(&self.jobs_url)
            .query(&[("user_id", user_id.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Job list failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Parse(format!("Job list response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_serializes_set_fields_only() {
        let patch = JobPatch::progress("Fetching market data");
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"progress_message": "Fetching market data"})
        );
    }

    #[test]
    fn test_status_patch_wire_name() {
        let patch = JobPatch::status(JobStatus::Running);
        let body = serde_json::to_value(&patch).unwrap();
        assert_eq!(body, serde_json::json!({"status": "running"}));
    }

    #[test]
    fn test_row_url() {
        let client = JobStoreClient::new(Client::new(), "https://store.example");
        let id = JobId::new();
        assert_eq!(client.row_url(id), format!("https://store.example/jobs/{id}"));
    }
}
