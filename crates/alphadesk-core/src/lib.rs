//! Core domain types for the alphadesk research-job orchestrator.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - `JobId`, `UserId`: opaque identifiers
//! - `Feature`, `CreditType`: closed analysis/billing enums
//! - `JobStatus`, `JobRow`: the persisted job record mirrored client-side
//! - `ActiveJob`, `CompletedJob`: UI-facing projections
//! - `TriggerRequest`, `JobOutcome`: the workflow-engine request/result pair

pub mod error;
pub mod job;
pub mod projection;
pub mod request;

pub use error::{CoreError, Result};
pub use job::{CreditType, Feature, JobId, JobRow, JobStatus, UserId};
pub use projection::{ActiveJob, CompletedJob};
pub use request::{JobOutcome, TriggerRequest};
