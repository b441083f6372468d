//! Job identification and the persisted job record.
//!
//! A job is one user-initiated analysis request tracked end-to-end by id.
//! The backend owns the row; the client mirrors it and enforces all state
//! machine invariants itself when interpreting change events, because the
//! record store is a dumb key-value keeper.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque job identifier, generated client-side at submit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh v4 id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Owner of a job; all change-feed subscriptions are scoped to this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Credit type charged when a job is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditType {
    Queries,
    Ideas,
    Reports,
}

impl fmt::Display for CreditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queries => write!(f, "queries"),
            Self::Ideas => write!(f, "ideas"),
            Self::Reports => write!(f, "reports"),
        }
    }
}

/// Closed set of analysis kinds.
///
/// The feature determines the workflow route, the credit type charged,
/// and the simulated progress script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    TradeSetup,
    MacroCommentary,
    Report,
    MacroLab,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::TradeSetup,
        Feature::MacroCommentary,
        Feature::Report,
        Feature::MacroLab,
    ];

    /// Credit type charged for this feature.
    pub fn credit_type(&self) -> CreditType {
        match self {
            Self::TradeSetup | Self::MacroLab => CreditType::Ideas,
            Self::MacroCommentary => CreditType::Queries,
            Self::Report => CreditType::Reports,
        }
    }

    /// Wire name used in job rows and trigger payloads.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::TradeSetup => "trade-setup",
            Self::MacroCommentary => "macro-commentary",
            Self::Report => "report",
            Self::MacroLab => "macro-lab",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl FromStr for Feature {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trade-setup" => Ok(Self::TradeSetup),
            "macro-commentary" => Ok(Self::MacroCommentary),
            "report" => Ok(Self::Report),
            "macro-lab" => Ok(Self::MacroLab),
            other => Err(CoreError::UnknownFeature(other.to_string())),
        }
    }
}

/// Job status. Monotonic `pending -> running -> {completed | error}`,
/// except that non-terminal states may receive repeated progress patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Mirror of the persisted job row, delivered as whole-row snapshots
/// by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: JobId,
    pub user_id: UserId,
    pub feature: Feature,
    /// Free-text subject of the analysis (e.g. an asset symbol). Display only.
    pub instrument: String,
    pub status: JobStatus,
    /// Parameters sent to the workflow engine. Immutable after creation.
    pub request_payload: Value,
    /// Present only when `status = completed`. Immutable once set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_payload: Option<Value>,
    /// Last-write-wins human-readable status string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Present only when `status = error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    /// Build a fresh pending row for submission.
    pub fn new_pending(
        id: JobId,
        user_id: UserId,
        feature: Feature,
        instrument: impl Into<String>,
        request_payload: Value,
    ) -> Self {
        Self {
            id,
            user_id,
            feature,
            instrument: instrument.into(),
            status: JobStatus::Pending,
            request_payload,
            response_payload: None,
            progress_message: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// The user's question, extracted from the request payload for display.
    pub fn user_query(&self) -> Option<&str> {
        self.request_payload
            .get("question")
            .and_then(Value::as_str)
    }

    /// Whether the row carries a usable completion payload.
    ///
    /// A `completed` status with an empty or absent payload is treated as a
    /// failure by the lifecycle store, never as a completion.
    pub fn has_result(&self) -> bool {
        match &self.response_payload {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Object(m)) => !m.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(status: JobStatus, payload: Option<Value>) -> JobRow {
        JobRow {
            id: JobId::new(),
            user_id: UserId::new("u1"),
            feature: Feature::TradeSetup,
            instrument: "EURUSD".to_string(),
            status,
            request_payload: json!({"question": "swing setup?"}),
            response_payload: payload,
            progress_message: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_feature_credit_types() {
        assert_eq!(Feature::TradeSetup.credit_type(), CreditType::Ideas);
        assert_eq!(Feature::MacroLab.credit_type(), CreditType::Ideas);
        assert_eq!(Feature::MacroCommentary.credit_type(), CreditType::Queries);
        assert_eq!(Feature::Report.credit_type(), CreditType::Reports);
    }

    #[test]
    fn test_feature_wire_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(feature.wire_name().parse::<Feature>().unwrap(), feature);
        }
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
        let status: JobStatus = serde_json::from_str("\"error\"").unwrap();
        assert_eq!(status, JobStatus::Error);
        assert!(status.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_user_query_extraction() {
        let r = row(JobStatus::Pending, None);
        assert_eq!(r.user_query(), Some("swing setup?"));
    }

    #[test]
    fn test_has_result_rejects_empty_payloads() {
        assert!(!row(JobStatus::Completed, None).has_result());
        assert!(!row(JobStatus::Completed, Some(Value::Null)).has_result());
        assert!(!row(JobStatus::Completed, Some(json!({}))).has_result());
        assert!(!row(JobStatus::Completed, Some(json!(""))).has_result());
        assert!(row(JobStatus::Completed, Some(json!({"entry": 1.1}))).has_result());
    }

    #[test]
    fn test_job_row_round_trip() {
        let r = row(JobStatus::Completed, Some(json!({"entry": 1.1})));
        let encoded = serde_json::to_string(&r).unwrap();
        let decoded: JobRow = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, r.id);
        assert_eq!(decoded.status, JobStatus::Completed);
        assert_eq!(decoded.feature, Feature::TradeSetup);
    }
}
