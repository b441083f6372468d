//! Job orchestration core.
//!
//! Everything between "the user pressed submit" and "the user saw exactly
//! one outcome" lives here:
//! - admission with an atomic credit reservation and a compensating delete
//! - the dual-transport completion resolver (HTTP response racing the
//!   change feed), synchronized by the single-claim `CompletionLatch`
//! - the `ProgressSimulator`, which yields permanently to real telemetry
//! - the `JobLifecycleStore`, the canonical client-side Active/Completed
//!   collections and the change-event classifier
//!
//! The design is correct under any interleaving of the HTTP response,
//! change-feed events, and simulator timers; the latch is the only
//! ordering-dependent synchronization point.

pub mod error;
pub mod latch;
pub mod lifecycle;
pub mod orchestrator;
pub mod ports;
pub mod script;
pub mod simulator;

pub use error::SubmitError;
pub use latch::{Claim, CompletionHandler, CompletionLatch};
pub use lifecycle::{JobLifecycleStore, LifecycleEvent, Transition};
pub use orchestrator::{JobOrchestrator, SubmitRequest};
pub use ports::{AnalysisEngine, CreditGateway, JobStore};
pub use script::{ProgressScript, ScriptStep};
pub use simulator::ProgressSimulator;
