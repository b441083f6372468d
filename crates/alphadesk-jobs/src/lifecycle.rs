//! Canonical client-side job collections and change-event classification.
//!
//! The lifecycle store owns the Active and Completed collections, consumes
//! the session-wide change-feed subscription, and turns every row event
//! into exactly one transition. Terminal transitions funnel through the
//! completion latch so that a job raced by the dual-transport resolver is
//! settled exactly once no matter which channel delivered first.

use crate::latch::{Claim, CompletionLatch};
use crate::simulator::ProgressSimulator;
use alphadesk_core::{ActiveJob, CompletedJob, Feature, JobId, JobOutcome, JobRow, JobStatus};
use alphadesk_feed::{FeedEvent, FeedEventKind};
use alphadesk_telemetry::metrics;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Failure text used when a completed row carries no usable payload.
pub const NO_RESULT_MESSAGE: &str = "no result available";

/// Default capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 64;

/// The single transition derived from one feed event.
///
/// The four branches are mutually exclusive; classification never applies
/// more than one to the same payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// INSERT: a new row appears; upsert into Active.
    Admitted,
    /// Non-terminal status change, possibly carrying real progress.
    Running { progress: Option<String> },
    /// Non-terminal patch that only updates the progress message.
    Progress { message: String },
    /// Terminal success with a usable payload.
    Settled { payload: Value },
    /// Terminal failure (`status=error`, or completed without a payload).
    Faulted { message: String },
    /// Nothing actionable (e.g. a patch with no visible change).
    NoOp,
}

/// Classify a feed event into exactly one transition.
pub fn classify(event: &FeedEvent) -> Transition {
    let row = &event.row;

    if event.kind == FeedEventKind::Insert {
        return Transition::Admitted;
    }

    match row.status {
        JobStatus::Completed => {
            if row.has_result() {
                Transition::Settled {
                    // has_result() guarantees presence.
                    payload: row.response_payload.clone().unwrap_or(Value::Null),
                }
            } else {
                Transition::Faulted {
                    message: NO_RESULT_MESSAGE.to_string(),
                }
            }
        }
        JobStatus::Error => Transition::Faulted {
            message: row
                .error_message
                .clone()
                .unwrap_or_else(|| "analysis failed".to_string()),
        },
        JobStatus::Running => Transition::Running {
            progress: row
                .progress_message
                .clone()
                .filter(|m| !m.is_empty()),
        },
        JobStatus::Pending => match row.progress_message.clone().filter(|m| !m.is_empty()) {
            Some(message) => Transition::Progress { message },
            None => Transition::NoOp,
        },
    }
}

/// Lifecycle transitions broadcast to the notification fan-out.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Submitted { job: ActiveJob },
    Progress { job_id: JobId, message: String },
    Completed { job: CompletedJob },
    Failed {
        job_id: JobId,
        feature: Feature,
        instrument: String,
        message: String,
    },
    AdmissionDenied { feature: Feature, message: String },
    Acknowledged { job_id: JobId },
}

struct ActiveEntry {
    job: ActiveJob,
    /// Set once a non-empty progress message arrives from the backend;
    /// simulated messages must never overwrite real telemetry.
    real_progress: bool,
}

/// Canonical client-side job state.
pub struct JobLifecycleStore {
    active: RwLock<HashMap<JobId, ActiveEntry>>,
    completed: RwLock<Vec<CompletedJob>>,
    events: broadcast::Sender<LifecycleEvent>,
    latch: Arc<CompletionLatch>,
    simulator: Arc<ProgressSimulator>,
}

impl JobLifecycleStore {
    pub fn new(latch: Arc<CompletionLatch>, simulator: Arc<ProgressSimulator>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            active: RwLock::new(HashMap::new()),
            completed: RwLock::new(Vec::new()),
            events,
            latch,
            simulator,
        }
    }

    /// Subscribe to lifecycle transitions (notification fan-out).
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Admit a freshly submitted job into the Active collection.
    pub fn admit(&self, job: ActiveJob) {
        info!(job_id = %job.id, feature = %job.feature, "Job admitted");
        metrics::JOBS_SUBMITTED
            .with_label_values(&[job.feature.wire_name()])
            .inc();
        {
            let mut active = self.active.write();
            active.insert(
                job.id,
                ActiveEntry {
                    job: job.clone(),
                    real_progress: false,
                },
            );
            metrics::ACTIVE_JOBS.set(active.len() as i64);
        }
        self.emit(LifecycleEvent::Submitted { job });
    }

    /// Record an admission blocked by the credit ledger.
    pub fn admission_denied(&self, feature: Feature, message: impl Into<String>) {
        metrics::CREDIT_DENIALS.inc();
        self.emit(LifecycleEvent::AdmissionDenied {
            feature,
            message: message.into(),
        });
    }

    /// Process one session-feed event.
    pub fn handle_feed_event(&self, event: &FeedEvent) {
        let job_id = event.job_id();
        match classify(event) {
            Transition::Admitted => self.upsert_active(&event.row),
            Transition::Running { progress } => {
                self.patch_status(job_id, JobStatus::Running);
                if let Some(message) = progress {
                    self.apply_real_progress(job_id, message);
                }
            }
            Transition::Progress { message } => self.apply_real_progress(job_id, message),
            Transition::Settled { payload } => {
                self.settle_via_latch(job_id, JobOutcome::Completed(payload))
            }
            Transition::Faulted { message } => {
                self.settle_via_latch(job_id, JobOutcome::Failed { message })
            }
            Transition::NoOp => {}
        }
    }

    /// Route a terminal outcome through the latch.
    ///
    /// `Won` means this delivery is the first for the id; `AlreadySettled`
    /// is the expected duplicate and a silent no-op; `Unregistered` means
    /// no resolver raced this id (recovered/foreign job) and the
    /// transition is applied directly.
    fn settle_via_latch(&self, job_id: JobId, outcome: JobOutcome) {
        match self.latch.claim(job_id) {
            Claim::Won(handler) => handler(outcome),
            Claim::AlreadySettled => {
                debug!(%job_id, "Duplicate terminal delivery ignored");
            }
            Claim::Unregistered => self.settle(job_id, outcome),
        }
    }

    /// Apply the terminal transition. Runs exactly once per job id — the
    /// latch guarantees it for raced jobs, the Active-collection removal
    /// makes duplicates harmless for unraced ones.
    pub fn settle(&self, job_id: JobId, outcome: JobOutcome) {
        let entry = {
            let mut active = self.active.write();
            let entry = active.remove(&job_id);
            metrics::ACTIVE_JOBS.set(active.len() as i64);
            entry
        };

        let Some(entry) = entry else {
            debug!(%job_id, "Terminal outcome for unknown or dismissed job; dropped");
            return;
        };

        self.simulator.cancel(job_id);

        match outcome {
            JobOutcome::Completed(payload) => {
                info!(%job_id, "Job completed");
                metrics::JOBS_COMPLETED.inc();
                let completed = CompletedJob::from_active(&entry.job, payload);
                self.completed.write().push(completed.clone());
                self.emit(LifecycleEvent::Completed { job: completed });
            }
            JobOutcome::Failed { message } => {
                warn!(%job_id, %message, "Job failed");
                let reason = if message == NO_RESULT_MESSAGE {
                    "malformed_completion"
                } else {
                    "backend_error"
                };
                metrics::JOBS_FAILED.with_label_values(&[reason]).inc();
                self.emit(LifecycleEvent::Failed {
                    job_id,
                    feature: entry.job.feature,
                    instrument: entry.job.instrument.clone(),
                    message,
                });
            }
        }
    }

    /// Remove a job on user acknowledgement (view or dismiss) and tear
    /// down everything still keyed to its id.
    pub fn acknowledge(&self, job_id: JobId) {
        {
            let mut active = self.active.write();
            active.remove(&job_id);
            metrics::ACTIVE_JOBS.set(active.len() as i64);
        }
        self.completed.write().retain(|job| job.id != job_id);
        self.simulator.cancel(job_id);
        self.latch.clear(job_id);
        self.emit(LifecycleEvent::Acknowledged { job_id });
    }

    /// Apply a synthetic progress message. No-op once real telemetry has
    /// been seen for the id or the job is gone.
    pub fn apply_simulated_progress(&self, job_id: JobId, message: String) {
        let mut active = self.active.write();
        let Some(entry) = active.get_mut(&job_id) else {
            return;
        };
        if entry.real_progress {
            return;
        }
        entry.job.progress_message = Some(message.clone());
        drop(active);
        self.emit(LifecycleEvent::Progress { job_id, message });
    }

    fn apply_real_progress(&self, job_id: JobId, message: String) {
        // Real telemetry permanently disables the simulator for this id.
        self.simulator.mute(job_id);
        let mut active = self.active.write();
        let Some(entry) = active.get_mut(&job_id) else {
            return;
        };
        entry.real_progress = true;
        entry.job.progress_message = Some(message.clone());
        drop(active);
        debug!(%job_id, %message, "Real progress applied");
        self.emit(LifecycleEvent::Progress { job_id, message });
    }

    fn upsert_active(&self, row: &JobRow) {
        if row.status.is_terminal() {
            return;
        }
        let mut active = self.active.write();
        if active.contains_key(&row.id) {
            return;
        }
        // A row inserted outside this session (another tab, recovery).
        let job = ActiveJob::from_row(row);
        active.insert(
            row.id,
            ActiveEntry {
                job: job.clone(),
                real_progress: false,
            },
        );
        metrics::ACTIVE_JOBS.set(active.len() as i64);
        drop(active);
        self.emit(LifecycleEvent::Submitted { job });
    }

    fn patch_status(&self, job_id: JobId, status: JobStatus) {
        let mut active = self.active.write();
        if let Some(entry) = active.get_mut(&job_id) {
            entry.job.status = status;
        }
    }

    fn emit(&self, event: LifecycleEvent) {
        // Send errors mean no notifier is attached, which is fine.
        let _ = self.events.send(event);
    }

    /// Snapshot of the Active collection.
    pub fn active_jobs(&self) -> Vec<ActiveJob> {
        self.active
            .read()
            .values()
            .map(|entry| entry.job.clone())
            .collect()
    }

    /// Snapshot of the Completed collection, oldest first.
    pub fn completed_jobs(&self) -> Vec<CompletedJob> {
        self.completed.read().clone()
    }

    /// Whether the id is currently in the Active collection.
    pub fn is_active(&self, job_id: JobId) -> bool {
        self.active.read().contains_key(&job_id)
    }

    /// Whether the id is currently in the Completed collection.
    pub fn is_completed(&self, job_id: JobId) -> bool {
        self.completed.read().iter().any(|job| job.id == job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alphadesk_core::UserId;
    use serde_json::json;

    fn store() -> JobLifecycleStore {
        JobLifecycleStore::new(
            Arc::new(CompletionLatch::new()),
            Arc::new(ProgressSimulator::new()),
        )
    }

    fn pending_row(id: JobId) -> JobRow {
        JobRow::new_pending(
            id,
            UserId::new("u1"),
            Feature::TradeSetup,
            "EURUSD",
            json!({"question": "q"}),
        )
    }

    fn admit(store: &JobLifecycleStore, id: JobId) {
        store.admit(ActiveJob::from_row(&pending_row(id)));
    }

    fn update(mut row: JobRow, status: JobStatus) -> FeedEvent {
        row.status = status;
        FeedEvent::update(row)
    }

    #[test]
    fn test_classify_insert() {
        let event = FeedEvent::insert(pending_row(JobId::new()));
        assert_eq!(classify(&event), Transition::Admitted);
    }

    #[test]
    fn test_classify_completed_with_payload() {
        let mut row = pending_row(JobId::new());
        row.status = JobStatus::Completed;
        row.response_payload = Some(json!({"entry": 1.1}));
        assert_eq!(
            classify(&FeedEvent::update(row)),
            Transition::Settled {
                payload: json!({"entry": 1.1})
            }
        );
    }

    #[test]
    fn test_classify_completed_without_payload_is_fault() {
        let row = pending_row(JobId::new());
        let event = update(row, JobStatus::Completed);
        assert_eq!(
            classify(&event),
            Transition::Faulted {
                message: NO_RESULT_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_classify_error_uses_row_message() {
        let mut row = pending_row(JobId::new());
        row.status = JobStatus::Error;
        row.error_message = Some("engine overloaded".to_string());
        assert_eq!(
            classify(&FeedEvent::update(row)),
            Transition::Faulted {
                message: "engine overloaded".to_string()
            }
        );
    }

    #[test]
    fn test_classify_running_with_progress() {
        let mut row = pending_row(JobId::new());
        row.status = JobStatus::Running;
        row.progress_message = Some("Fetching market data".to_string());
        assert_eq!(
            classify(&FeedEvent::update(row)),
            Transition::Running {
                progress: Some("Fetching market data".to_string())
            }
        );
    }

    #[test]
    fn test_classify_empty_progress_is_noop() {
        let mut row = pending_row(JobId::new());
        row.progress_message = Some(String::new());
        assert_eq!(classify(&FeedEvent::update(row)), Transition::NoOp);
    }

    #[tokio::test]
    async fn test_settle_moves_active_to_completed() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);
        assert!(store.is_active(id));

        store.settle(id, JobOutcome::Completed(json!({"entry": 1.1})));

        assert!(!store.is_active(id));
        assert!(store.is_completed(id));
    }

    #[tokio::test]
    async fn test_settle_failure_creates_no_completed_entry() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);

        store.settle(id, JobOutcome::failed("boom"));

        assert!(!store.is_active(id));
        assert!(!store.is_completed(id));
    }

    #[tokio::test]
    async fn test_malformed_completion_reported_as_failure() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);
        let mut events = store.subscribe();

        store.handle_feed_event(&update(pending_row(id), JobStatus::Completed));

        assert!(!store.is_completed(id));
        assert!(!store.is_active(id));
        match events.recv().await.unwrap() {
            LifecycleEvent::Failed { message, .. } => assert_eq!(message, NO_RESULT_MESSAGE),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_terminal_event_is_noop() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);

        let mut row = pending_row(id);
        row.status = JobStatus::Completed;
        row.response_payload = Some(json!({"entry": 1.1}));
        let event = FeedEvent::update(row);

        store.handle_feed_event(&event);
        store.handle_feed_event(&event);

        assert_eq!(store.completed_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_real_progress_blocks_simulated() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);

        let mut row = pending_row(id);
        row.status = JobStatus::Running;
        row.progress_message = Some("Fetching market data".to_string());
        store.handle_feed_event(&FeedEvent::update(row));

        store.apply_simulated_progress(id, "synthetic step".to_string());

        let jobs = store.active_jobs();
        assert_eq!(
            jobs[0].progress_message.as_deref(),
            Some("Fetching market data")
        );
    }

    #[tokio::test]
    async fn test_acknowledge_clears_everything() {
        let latch = Arc::new(CompletionLatch::new());
        let store = JobLifecycleStore::new(latch.clone(), Arc::new(ProgressSimulator::new()));
        let id = JobId::new();
        admit(&store, id);
        latch.register(id, Box::new(|_| {}));

        store.acknowledge(id);

        assert!(!store.is_active(id));
        assert!(!latch.is_registered(id));
    }

    #[tokio::test]
    async fn test_insert_event_is_idempotent_with_local_admit() {
        let store = store();
        let id = JobId::new();
        admit(&store, id);

        store.handle_feed_event(&FeedEvent::insert(pending_row(id)));

        assert_eq!(store.active_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_for_unraced_job_applies_directly() {
        // No latch entry: a job recovered from a previous session.
        let store = store();
        let id = JobId::new();
        store.handle_feed_event(&FeedEvent::insert(pending_row(id)));

        let mut row = pending_row(id);
        row.status = JobStatus::Completed;
        row.response_payload = Some(json!({"done": true}));
        store.handle_feed_event(&FeedEvent::update(row));

        assert!(store.is_completed(id));
    }
}
