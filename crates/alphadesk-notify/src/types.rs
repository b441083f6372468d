//! Notification surface types.

use alphadesk_core::{Feature, JobId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Visual weight of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    /// Blocking, destructive-styled notices (admission failures).
    Destructive,
}

/// An ephemeral flash message; expires after the configured TTL.
#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    pub id: u64,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A persistent, non-auto-dismissing notification. Created only for
/// terminal failures; carries the originating feature so the UI can route
/// a retry back to it.
#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: u64,
    pub job_id: JobId,
    pub message: String,
    pub retry: Option<Feature>,
    pub created_at: DateTime<Utc>,
}
