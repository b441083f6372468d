//! HTTP clients for the three remote collaborators.
//!
//! The orchestration core never talks to the network directly; it goes
//! through these narrow clients:
//! - `CreditClient`: atomic "try engage credit" against the credit ledger
//! - `JobStoreClient`: insert/patch/delete/list on the persisted job table
//! - `EngineClient`: the triggering POST to the workflow-engine proxy,
//!   including the ordered response-envelope extraction paths
//!
//! None of these carry business logic; all state-machine invariants are
//! enforced client-side by `alphadesk-jobs` when interpreting events.

pub mod credit;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod store;

pub use credit::{CreditClient, CreditReservation};
pub use engine::{EngineClient, TriggerReply};
pub use envelope::extract_result;
pub use error::{GatewayError, GatewayResult};
pub use store::{JobPatch, JobStoreClient};
