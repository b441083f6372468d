//! End-to-end races across the submission pipeline: the HTTP trigger
//! response against the change feed, the simulator against real
//! telemetry, and admission against the credit ledger.

use alphadesk_core::{
    CreditType, Feature, JobId, JobRow, JobStatus, TriggerRequest, UserId,
};
use alphadesk_feed::{FeedEvent, FeedHub};
use alphadesk_gateway::{CreditReservation, GatewayError, GatewayResult, JobPatch, TriggerReply};
use alphadesk_jobs::{
    AnalysisEngine, CompletionLatch, CreditGateway, JobLifecycleStore, JobOrchestrator, JobStore,
    LifecycleEvent, ProgressScript, ProgressSimulator, ScriptStep, SubmitError, SubmitRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::Notify;

struct FakeCredit {
    success: bool,
    calls: AtomicUsize,
}

impl FakeCredit {
    fn granting() -> Self {
        Self {
            success: true,
            calls: AtomicUsize::new(0),
        }
    }

    fn denying() -> Self {
        Self {
            success: false,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CreditGateway for FakeCredit {
    async fn try_engage(
        &self,
        _credit_type: CreditType,
        _job_id: JobId,
    ) -> GatewayResult<CreditReservation> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreditReservation {
            success: self.success,
            available: if self.success { Some(3) } else { Some(0) },
        })
    }
}

#[derive(Default)]
struct FakeStore {
    rows: Mutex<HashMap<JobId, JobRow>>,
    deletes: AtomicUsize,
}

#[async_trait]
impl JobStore for FakeStore {
    async fn insert(&self, row: &JobRow) -> GatewayResult<JobId> {
        self.rows.lock().insert(row.id, row.clone());
        Ok(row.id)
    }

    async fn patch(&self, _id: JobId, _patch: &JobPatch) -> GatewayResult<()> {
        Ok(())
    }

    async fn delete(&self, id: JobId) -> GatewayResult<()> {
        self.rows.lock().remove(&id);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum EngineMode {
    /// Reply immediately.
    Immediate(TriggerReply),
    /// Hold the request open until `Notify` fires, then reply.
    Gated(Arc<Notify>, TriggerReply),
    /// Fail at the transport level.
    TransportError,
}

struct FakeEngine {
    mode: Mutex<Option<EngineMode>>,
    triggered: AtomicUsize,
}

impl FakeEngine {
    fn new(mode: EngineMode) -> Self {
        Self {
            mode: Mutex::new(Some(mode)),
            triggered: AtomicUsize::new(0),
        }
    }

    fn ok_reply(body: Value) -> TriggerReply {
        TriggerReply {
            ok: true,
            status: 200,
            body: Some(body),
        }
    }
}

#[async_trait]
impl AnalysisEngine for FakeEngine {
    async fn trigger(&self, _request: &TriggerRequest) -> GatewayResult<TriggerReply> {
        self.triggered.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().take().expect("single trigger per test");
        match mode {
            EngineMode::Immediate(reply) => Ok(reply),
            EngineMode::Gated(gate, reply) => {
                gate.notified().await;
                Ok(reply)
            }
            EngineMode::TransportError => {
                Err(GatewayError::HttpClient("connection reset".to_string()))
            }
        }
    }
}

struct Harness {
    orchestrator: JobOrchestrator,
    lifecycle: Arc<JobLifecycleStore>,
    latch: Arc<CompletionLatch>,
    simulator: Arc<ProgressSimulator>,
    hub: FeedHub,
    store: Arc<FakeStore>,
    events: broadcast::Receiver<LifecycleEvent>,
}

fn harness(credit: FakeCredit, engine: FakeEngine) -> Harness {
    let latch = Arc::new(CompletionLatch::new());
    let simulator = Arc::new(ProgressSimulator::new());
    let lifecycle = Arc::new(JobLifecycleStore::new(latch.clone(), simulator.clone()));
    let hub = FeedHub::new();
    let store = Arc::new(FakeStore::default());

    let orchestrator = JobOrchestrator::new(
        UserId::new("u1"),
        Arc::new(credit),
        store.clone(),
        Arc::new(engine),
        hub.clone(),
        lifecycle.clone(),
        latch.clone(),
        simulator.clone(),
    );
    orchestrator.spawn_session_feed();

    let events = lifecycle.subscribe();
    Harness {
        orchestrator,
        lifecycle,
        latch,
        simulator,
        hub,
        store,
        events,
    }
}

fn completed_row(id: JobId, payload: Value) -> JobRow {
    let mut row = JobRow::new_pending(
        id,
        UserId::new("u1"),
        Feature::TradeSetup,
        "EURUSD",
        json!({"question": "q"}),
    );
    row.status = JobStatus::Completed;
    row.response_payload = Some(payload);
    row
}

fn drain(events: &mut broadcast::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn count_terminal(events: &[LifecycleEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, LifecycleEvent::Completed { .. } | LifecycleEvent::Failed { .. }))
        .count()
}

async fn settle_tasks() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

// Scenario A: the change feed completes the job while the HTTP call hangs;
// the late HTTP result is discarded.
#[tokio::test(start_paused = true)]
async fn feed_wins_while_http_hangs() {
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::new(EngineMode::Gated(
        gate.clone(),
        FakeEngine::ok_reply(json!({"message": {"content": {"content": {"entry": 9.9}}}})),
    ));
    let mut h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::TradeSetup, "EURUSD", "setup?"))
        .await
        .unwrap();
    settle_tasks().await;

    h.hub
        .publish(FeedEvent::update(completed_row(job_id, json!({"entry": 1.1}))));
    settle_tasks().await;

    let completed = h.lifecycle.completed_jobs();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].result, json!({"entry": 1.1}));
    assert!(!h.lifecycle.is_active(job_id));

    // The hung HTTP promise resolves with a different payload; it loses
    // the latch and its result is discarded.
    gate.notify_one();
    settle_tasks().await;

    let completed = h.lifecycle.completed_jobs();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].result, json!({"entry": 1.1}));
    assert_eq!(count_terminal(&drain(&mut h.events)), 1);
}

// Scenario B: the HTTP path wins; a later duplicate change-feed UPDATE for
// the same id is a no-op.
#[tokio::test(start_paused = true)]
async fn http_wins_duplicate_feed_event_ignored() {
    let engine = FakeEngine::new(EngineMode::Immediate(FakeEngine::ok_reply(
        json!({"message": {"message": {"content": {"content": {"bias": "long"}}}}}),
    )));
    let mut h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::TradeSetup, "EURUSD", "setup?"))
        .await
        .unwrap();
    settle_tasks().await;

    let completed = h.lifecycle.completed_jobs();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].result, json!({"bias": "long"}));

    // Duplicate terminal delivery from the feed.
    h.hub
        .publish(FeedEvent::update(completed_row(job_id, json!({"bias": "short"}))));
    settle_tasks().await;

    let completed = h.lifecycle.completed_jobs();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].result, json!({"bias": "long"}));
    assert_eq!(count_terminal(&drain(&mut h.events)), 1);

    // The HTTP winner tore the watcher down.
    assert_eq!(h.orchestrator.open_watchers(), 0);
}

// Scenario C: insufficient credits. No row persists, nothing is admitted,
// and no subscription or timer was ever created for the id.
#[tokio::test(start_paused = true)]
async fn credit_denial_compensates_and_blocks() {
    let engine = FakeEngine::new(EngineMode::Immediate(FakeEngine::ok_reply(json!({}))));
    let mut h = harness(FakeCredit::denying(), engine);

    let result = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::Report, "SPX", "weekly?"))
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, SubmitError::CreditsExhausted { .. }));

    settle_tasks().await;
    assert!(h.store.rows.lock().is_empty());
    assert_eq!(h.store.deletes.load(Ordering::SeqCst), 1);
    assert!(h.lifecycle.active_jobs().is_empty());
    assert!(h.latch.is_empty());
    assert_eq!(h.orchestrator.open_watchers(), 0);

    let events = drain(&mut h.events);
    assert!(events
        .iter()
        .any(|e| matches!(e, LifecycleEvent::AdmissionDenied { .. })));
    assert_eq!(count_terminal(&events), 0);
}

// Scenario D: real telemetry between simulated steps two and three; step
// three never applies and the real message sticks.
#[tokio::test(start_paused = true)]
async fn simulator_yields_to_real_progress() {
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::new(EngineMode::Gated(
        gate.clone(),
        FakeEngine::ok_reply(json!({})),
    ));
    let mut h = harness(FakeCredit::granting(), engine);

    h.orchestrator.set_script(
        Feature::TradeSetup,
        ProgressScript::new(vec![
            ScriptStep::new("step one", 1_000, 1_000),
            ScriptStep::new("step two", 1_000, 1_000),
            ScriptStep::new("step three", 1_000, 1_000),
        ]),
    );

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::TradeSetup, "EURUSD", "setup?"))
        .await
        .unwrap();

    // Let steps one and two land.
    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let jobs = h.lifecycle.active_jobs();
    assert_eq!(jobs[0].progress_message.as_deref(), Some("step two"));

    // Real telemetry arrives between steps two and three.
    let mut row = JobRow::new_pending(
        job_id,
        UserId::new("u1"),
        Feature::TradeSetup,
        "EURUSD",
        json!({"question": "q"}),
    );
    row.status = JobStatus::Running;
    row.progress_message = Some("Fetching market data".to_string());
    h.hub.publish(FeedEvent::update(row));
    settle_tasks().await;

    assert!(h.simulator.is_muted(job_id));

    // Step three's timer window passes; the real message must stick.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let jobs = h.lifecycle.active_jobs();
    assert_eq!(
        jobs[0].progress_message.as_deref(),
        Some("Fetching market data")
    );
}

// Malformed completion: completed status without a payload is reported as
// a failure and never appears in the Completed collection.
#[tokio::test(start_paused = true)]
async fn malformed_completion_is_a_failure() {
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::new(EngineMode::Gated(
        gate.clone(),
        FakeEngine::ok_reply(json!({})),
    ));
    let mut h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::MacroLab, "DXY", "what if?"))
        .await
        .unwrap();
    settle_tasks().await;

    let mut row = completed_row(job_id, Value::Null);
    row.response_payload = None;
    h.hub.publish(FeedEvent::update(row));
    settle_tasks().await;

    assert!(h.lifecycle.completed_jobs().is_empty());
    assert!(!h.lifecycle.is_active(job_id));

    let events = drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        LifecycleEvent::Failed { message, .. } if message == "no result available"
    )));
    assert_eq!(count_terminal(&events), 1);
}

// Transport failure on the trigger is not fatal; the feed path resolves
// the job afterwards.
#[tokio::test(start_paused = true)]
async fn transport_failure_degrades_to_feed() {
    let engine = FakeEngine::new(EngineMode::TransportError);
    let mut h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::MacroCommentary, "EURUSD", "why?"))
        .await
        .unwrap();
    settle_tasks().await;

    // No failure surfaced to the user from the transport error.
    assert_eq!(count_terminal(&drain(&mut h.events)), 0);
    assert!(h.lifecycle.is_active(job_id));

    h.hub
        .publish(FeedEvent::update(completed_row(job_id, json!({"text": "done"}))));
    settle_tasks().await;

    assert_eq!(h.lifecycle.completed_jobs().len(), 1);
}

// Terminal backend error surfaces exactly one Failed event carrying the
// feature for the retry affordance.
#[tokio::test(start_paused = true)]
async fn backend_error_notifies_once_with_feature() {
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::new(EngineMode::Gated(
        gate.clone(),
        FakeEngine::ok_reply(json!({})),
    ));
    let mut h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::Report, "SPX", "weekly?"))
        .await
        .unwrap();
    settle_tasks().await;

    let mut row = completed_row(job_id, Value::Null);
    row.response_payload = None;
    row.status = JobStatus::Error;
    row.error_message = Some("engine overloaded".to_string());
    h.hub.publish(FeedEvent::update(row));
    settle_tasks().await;

    let events = drain(&mut h.events);
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            LifecycleEvent::Failed {
                feature, message, ..
            } => Some((*feature, message.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, Feature::Report);
    assert_eq!(failed[0].1, "engine overloaded");
}

// Acknowledgement tears down the latch, timers, and watcher for the id.
#[tokio::test(start_paused = true)]
async fn acknowledge_tears_down_resources() {
    let gate = Arc::new(Notify::new());
    let engine = FakeEngine::new(EngineMode::Gated(
        gate.clone(),
        FakeEngine::ok_reply(json!({})),
    ));
    let h = harness(FakeCredit::granting(), engine);

    let job_id = h
        .orchestrator
        .submit(SubmitRequest::new(Feature::TradeSetup, "EURUSD", "setup?"))
        .await
        .unwrap();
    settle_tasks().await;
    assert!(h.latch.is_registered(job_id));
    assert_eq!(h.orchestrator.open_watchers(), 1);

    h.orchestrator.acknowledge(job_id);
    settle_tasks().await;

    assert!(!h.latch.is_registered(job_id));
    assert_eq!(h.orchestrator.open_watchers(), 0);
    assert!(!h.lifecycle.is_active(job_id));
    assert!(!h.simulator.is_active(job_id));
}
