//! UI-facing projections of the job row.
//!
//! `ActiveJob` and `CompletedJob` are mutually exclusive by id at any
//! instant; the lifecycle store removes from Active before adding to
//! Completed, never leaving both visible.

use crate::job::{Feature, JobId, JobRow, JobStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Projection of a job while its status is pending or running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveJob {
    pub id: JobId,
    pub feature: Feature,
    pub instrument: String,
    pub status: JobStatus,
    /// The user's question, pulled out of the request payload for display.
    pub user_query: Option<String>,
    pub progress_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActiveJob {
    /// Project from a row snapshot. The caller guarantees a non-terminal status.
    pub fn from_row(row: &JobRow) -> Self {
        Self {
            id: row.id,
            feature: row.feature,
            instrument: row.instrument.clone(),
            status: row.status,
            user_query: row.user_query().map(str::to_string),
            progress_message: row.progress_message.clone(),
            created_at: row.created_at,
        }
    }
}

/// Projection of a job once it has completed with a usable result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedJob {
    pub id: JobId,
    pub feature: Feature,
    pub instrument: String,
    pub user_query: Option<String>,
    /// The extracted result payload.
    pub result: Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl CompletedJob {
    /// Project from an active entry plus the winning transport's result.
    pub fn from_active(active: &ActiveJob, result: Value) -> Self {
        Self {
            id: active.id,
            feature: active.feature,
            instrument: active.instrument.clone(),
            user_query: active.user_query.clone(),
            result,
            created_at: active.created_at,
            completed_at: Utc::now(),
        }
    }
}
