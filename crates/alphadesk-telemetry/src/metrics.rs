//! Prometheus metrics for the job orchestrator.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should crash at startup rather than fail silently. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_int_gauge, Counter, CounterVec, IntGauge,
};

/// Total jobs submitted, by feature.
pub static JOBS_SUBMITTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "alphadesk_jobs_submitted_total",
        "Total jobs admitted into the lifecycle store",
        &["feature"]
    )
    .unwrap()
});

/// Total jobs completed with a usable result.
pub static JOBS_COMPLETED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "alphadesk_jobs_completed_total",
        "Total jobs completed with a usable result payload"
    )
    .unwrap()
});

/// Total jobs that ended in a terminal failure, by reason.
pub static JOBS_FAILED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "alphadesk_jobs_failed_total",
        "Total jobs that ended in a terminal failure",
        &["reason"]
    )
    .unwrap()
});

/// Total admissions blocked by the credit ledger.
pub static CREDIT_DENIALS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "alphadesk_credit_denials_total",
        "Total job admissions blocked by credit reservation failure"
    )
    .unwrap()
});

/// Total rejected (second-or-later) completion latch claims.
pub static LATCH_REJECTIONS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "alphadesk_latch_rejections_total",
        "Total completion latch claims rejected because the job was already settled"
    )
    .unwrap()
});

/// Total simulated progress steps applied.
pub static SIMULATOR_STEPS: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "alphadesk_simulator_steps_total",
        "Total synthetic progress messages applied"
    )
    .unwrap()
});

/// Number of jobs currently in the Active collection.
pub static ACTIVE_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "alphadesk_active_jobs",
        "Jobs currently pending or running"
    )
    .unwrap()
});
