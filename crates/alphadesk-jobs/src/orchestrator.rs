//! Job submission pipeline and dual-transport completion resolver.
//!
//! Per submission:
//! 1. insert the pending row, then atomically reserve a credit; a failed
//!    reservation deletes the just-inserted row and aborts before any
//!    subscription or timer exists
//! 2. register the completion latch handler
//! 3. open the per-submission feed subscription *before* issuing the
//!    triggering POST, so a backend that completes between request and
//!    subscribe cannot be missed
//! 4. start the progress simulator
//! 5. race the HTTP response against the change feed; whichever claims the
//!    latch first hands its locally-parsed outcome to the lifecycle store,
//!    the loser discards silently
//!
//! Transport and parse failures on the HTTP path are absorbed: the request
//! degrades to "wait for the asynchronous channel". There is no client-side
//! completion timeout; a job may stay pending until the user dismisses it.

use crate::error::SubmitError;
use crate::latch::{Claim, CompletionLatch};
use crate::lifecycle::{JobLifecycleStore, NO_RESULT_MESSAGE};
use crate::ports::{AnalysisEngine, CreditGateway, JobStore};
use crate::script::ProgressScript;
use crate::simulator::ProgressSimulator;
use alphadesk_core::{
    ActiveJob, Feature, JobId, JobOutcome, JobRow, JobStatus, TriggerRequest, UserId,
};
use alphadesk_feed::FeedHub;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One submission, as handed over by the UI.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub feature: Feature,
    pub instrument: String,
    pub question: String,
    /// Feature-specific fields forwarded to the workflow engine.
    pub extra: Map<String, Value>,
}

impl SubmitRequest {
    pub fn new(
        feature: Feature,
        instrument: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        Self {
            feature,
            instrument: instrument.into(),
            question: question.into(),
            extra: Map::new(),
        }
    }
}

/// The orchestrator wiring one user's session together.
pub struct JobOrchestrator {
    user_id: UserId,
    credit: Arc<dyn CreditGateway>,
    store: Arc<dyn JobStore>,
    engine: Arc<dyn AnalysisEngine>,
    hub: FeedHub,
    lifecycle: Arc<JobLifecycleStore>,
    latch: Arc<CompletionLatch>,
    simulator: Arc<ProgressSimulator>,
    /// Per-submission change-feed watcher tasks, aborted when the HTTP
    /// path wins or the job is acknowledged.
    watchers: Arc<DashMap<JobId, JoinHandle<()>>>,
    /// Per-feature script overrides; defaults apply otherwise.
    scripts: HashMap<Feature, ProgressScript>,
}

impl JobOrchestrator {
    pub fn new(
        user_id: UserId,
        credit: Arc<dyn CreditGateway>,
        store: Arc<dyn JobStore>,
        engine: Arc<dyn AnalysisEngine>,
        hub: FeedHub,
        lifecycle: Arc<JobLifecycleStore>,
        latch: Arc<CompletionLatch>,
        simulator: Arc<ProgressSimulator>,
    ) -> Self {
        Self {
            user_id,
            credit,
            store,
            engine,
            hub,
            lifecycle,
            latch,
            simulator,
            watchers: Arc::new(DashMap::new()),
            scripts: HashMap::new(),
        }
    }

    /// Replace the default progress script for a feature.
    pub fn set_script(&mut self, feature: Feature, script: ProgressScript) {
        self.scripts.insert(feature, script);
    }

    fn script_for(&self, feature: Feature) -> ProgressScript {
        self.scripts
            .get(&feature)
            .cloned()
            .unwrap_or_else(|| ProgressScript::for_feature(feature))
    }

    /// Spawn the session-wide feed consumer driving the lifecycle store.
    ///
    /// One per session; the per-submission subscriptions opened by
    /// `submit` are additional and temporary.
    pub fn spawn_session_feed(&self) -> JoinHandle<()> {
        let mut sub = self.hub.subscribe(self.user_id.clone());
        let lifecycle = self.lifecycle.clone();
        tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                lifecycle.handle_feed_event(&event);
            }
            debug!("Session feed subscription closed");
        })
    }

    /// Submit one analysis job.
    ///
    /// Returns the job id once the job is admitted; everything after
    /// admission is reported through lifecycle events, never as an error
    /// from this method.
    pub async fn submit(&self, request: SubmitRequest) -> Result<JobId, SubmitError> {
        let job_id = JobId::new();
        let feature = request.feature;
        let credit_type = feature.credit_type();

        let trigger = TriggerRequest {
            job_id,
            feature,
            question: request.question.clone(),
            instrument: request.instrument.clone(),
            extra: request.extra.clone(),
        };

        let row = JobRow::new_pending(
            job_id,
            self.user_id.clone(),
            feature,
            request.instrument.clone(),
            trigger.to_payload(),
        );

        // Persist first; the reservation failure path compensates below.
        if let Err(e) = self.store.insert(&row).await {
            warn!(%job_id, error = %e, "Job insert failed");
            self.lifecycle
                .admission_denied(feature, format!("Could not start analysis: {e}"));
            return Err(SubmitError::Store(e));
        }

        match self.credit.try_engage(credit_type, job_id).await {
            Ok(reservation) if reservation.success => {
                debug!(%job_id, available = ?reservation.available, "Credit engaged");
            }
            Ok(reservation) => {
                info!(%job_id, %credit_type, "Credit reservation denied");
                self.compensate(job_id).await;
                self.lifecycle.admission_denied(
                    feature,
                    format!("No {credit_type} credits available"),
                );
                return Err(SubmitError::CreditsExhausted {
                    feature,
                    credit_type,
                    available: reservation.available,
                });
            }
            Err(e) => {
                warn!(%job_id, error = %e, "Credit reservation call failed");
                self.compensate(job_id).await;
                self.lifecycle
                    .admission_denied(feature, format!("Credit check failed: {e}"));
                return Err(SubmitError::Reservation(e));
            }
        }

        // Admitted: from here on every outcome flows through the latch.
        self.lifecycle.admit(ActiveJob::from_row(&row));

        let lifecycle = self.lifecycle.clone();
        self.latch.register(
            job_id,
            Box::new(move |outcome| lifecycle.settle(job_id, outcome)),
        );

        // Subscribe before the trigger POST.
        self.spawn_feed_watcher(job_id);

        let lifecycle = self.lifecycle.clone();
        self.simulator
            .start(job_id, self.script_for(feature), move |text| {
                lifecycle.apply_simulated_progress(job_id, text)
            });

        self.spawn_trigger(trigger);

        Ok(job_id)
    }

    /// Compensating delete after a failed reservation. Idempotent; a
    /// failed delete is logged, never surfaced to the user.
    async fn compensate(&self, job_id: JobId) {
        if let Err(e) = self.store.delete(job_id).await {
            warn!(%job_id, error = %e, "Compensating delete failed");
        }
    }

    /// Temporary per-submission subscription racing the HTTP path.
    fn spawn_feed_watcher(&self, job_id: JobId) {
        let mut sub = self.hub.subscribe(self.user_id.clone());
        let latch = self.latch.clone();
        let watchers = self.watchers.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = sub.recv().await {
                if latch.is_settled(job_id) {
                    break;
                }
                if event.job_id() != job_id {
                    continue;
                }

                let row = &event.row;
                let outcome = match row.status {
                    JobStatus::Completed if row.has_result() => Some(JobOutcome::Completed(
                        row.response_payload.clone().unwrap_or(Value::Null),
                    )),
                    JobStatus::Completed => Some(JobOutcome::failed(NO_RESULT_MESSAGE)),
                    JobStatus::Error => Some(JobOutcome::Failed {
                        message: row
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "analysis failed".to_string()),
                    }),
                    _ => None,
                };

                if let Some(outcome) = outcome {
                    if let Claim::Won(handler) = latch.claim(job_id) {
                        debug!(%job_id, "Change-feed path settled the job");
                        handler(outcome);
                    }
                    // Terminal observed either way: drop the subscription.
                    break;
                }
            }
            watchers.remove(&job_id);
        });

        self.watchers.insert(job_id, handle);
    }

    /// The triggering POST. Failures degrade to the change-feed path.
    fn spawn_trigger(&self, request: TriggerRequest) {
        let job_id = request.job_id;
        let engine = self.engine.clone();
        let latch = self.latch.clone();
        let watchers = self.watchers.clone();

        tokio::spawn(async move {
            let reply = match engine.trigger(&request).await {
                Ok(reply) => reply,
                Err(e) => {
                    debug!(%job_id, error = %e, "Trigger transport failed; deferring to change feed");
                    return;
                }
            };

            if !reply.ok {
                debug!(%job_id, status = reply.status, "Trigger returned non-OK; deferring to change feed");
                return;
            }

            let Some(result) = reply.result() else {
                debug!(%job_id, "Trigger body unusable; deferring to change feed");
                return;
            };

            if let Claim::Won(handler) = latch.claim(job_id) {
                debug!(%job_id, "HTTP path settled the job");
                handler(JobOutcome::Completed(result));
                // The feed watcher for this id is no longer needed.
                if let Some((_, watcher)) = watchers.remove(&job_id) {
                    watcher.abort();
                }
            }
        });
    }

    /// User acknowledgement: remove the job everywhere and tear down any
    /// subscription or timer still keyed to its id.
    pub fn acknowledge(&self, job_id: JobId) {
        if let Some((_, watcher)) = self.watchers.remove(&job_id) {
            watcher.abort();
        }
        self.lifecycle.acknowledge(job_id);
    }

    pub fn lifecycle(&self) -> &Arc<JobLifecycleStore> {
        &self.lifecycle
    }

    /// Number of per-submission watchers still running.
    pub fn open_watchers(&self) -> usize {
        self.watchers.len()
    }
}
