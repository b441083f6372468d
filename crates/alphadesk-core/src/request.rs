//! Workflow-engine trigger request and terminal outcome types.

use crate::job::{Feature, JobId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of the triggering POST to the workflow-engine proxy.
///
/// Carries the job id so the backend can correlate the asynchronous
/// row patch with this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub job_id: JobId,
    #[serde(rename = "type")]
    pub feature: Feature,
    pub question: String,
    pub instrument: String,
    /// Feature-specific fields, flattened into the body.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriggerRequest {
    pub fn new(
        job_id: JobId,
        feature: Feature,
        question: impl Into<String>,
        instrument: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            feature,
            question: question.into(),
            instrument: instrument.into(),
            extra: Map::new(),
        }
    }

    /// Attach a feature-specific field to the trigger body.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The request payload persisted on the job row.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The single terminal value a winning transport hands to the completion
/// handler. Exactly one of these is ever applied per job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job completed with a usable result payload.
    Completed(Value),
    /// The job failed, or completed without a usable payload.
    Failed { message: String },
}

impl JobOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trigger_serializes_type_and_flattens_extras() {
        let req = TriggerRequest::new(JobId::new(), Feature::MacroLab, "what if?", "DXY")
            .with_field("horizon", json!("3m"));
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["type"], json!("macro-lab"));
        assert_eq!(body["horizon"], json!("3m"));
        assert_eq!(body["question"], json!("what if?"));
        assert!(body["job_id"].is_string());
    }

    #[test]
    fn test_payload_round_trip() {
        let req = TriggerRequest::new(JobId::new(), Feature::Report, "q", "SPX");
        let payload = req.to_payload();
        assert_eq!(payload["instrument"], json!("SPX"));
    }
}
