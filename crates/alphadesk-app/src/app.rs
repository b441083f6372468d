//! Main application wiring.
//!
//! Builds the HTTP clients, the feed hub and its polling bridge, the
//! orchestration core, and the notification center, then runs a single
//! submission to its terminal outcome.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::feed_bridge::FeedBridge;
use alphadesk_core::{JobId, UserId};
use alphadesk_feed::FeedHub;
use alphadesk_gateway::{CreditClient, EngineClient, JobStoreClient};
use alphadesk_jobs::{
    CompletionLatch, JobLifecycleStore, JobOrchestrator, LifecycleEvent, ProgressSimulator,
    SubmitRequest,
};
use alphadesk_notify::{NotificationCenter, NotifyConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Shared-client request timeout for the ledger and job-table calls.
const GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Main application.
pub struct Application {
    config: AppConfig,
    user_id: UserId,
    store: Arc<JobStoreClient>,
    hub: FeedHub,
    orchestrator: JobOrchestrator,
    lifecycle: Arc<JobLifecycleStore>,
    notifier: Arc<NotificationCenter>,
    tasks: Vec<JoinHandle<()>>,
}

impl Application {
    /// Create a new application. Spawns nothing; call `start_background`
    /// before submitting.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let user_id = UserId::new(config.user_id.clone());

        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        let credit = Arc::new(CreditClient::new(http.clone(), &config.gateway.base_url));
        let store = Arc::new(JobStoreClient::new(http, &config.gateway.base_url));
        let engine = Arc::new(EngineClient::with_timeout(
            config.gateway.engine_url.clone(),
            Duration::from_millis(config.trigger_timeout_ms),
        )?);

        let hub = FeedHub::new();
        let latch = Arc::new(CompletionLatch::new());
        let simulator = Arc::new(ProgressSimulator::new());
        let lifecycle = Arc::new(JobLifecycleStore::new(latch.clone(), simulator.clone()));

        let mut orchestrator = JobOrchestrator::new(
            user_id.clone(),
            credit,
            store.clone(),
            engine,
            hub.clone(),
            lifecycle.clone(),
            latch,
            simulator,
        );

        for (feature, script) in &config.scripts {
            orchestrator.set_script(*feature, script.clone());
        }

        let notifier = Arc::new(NotificationCenter::new(NotifyConfig {
            flash_ttl: Duration::from_millis(config.flash_ttl_ms),
        }));

        Ok(Self {
            config,
            user_id,
            store,
            hub,
            orchestrator,
            lifecycle,
            notifier,
            tasks: Vec::new(),
        })
    }

    /// Spawn the session-wide background tasks: the feed bridge, the
    /// session feed consumer, and the notification consumer.
    pub fn start_background(&mut self) {
        let bridge = FeedBridge::new(
            self.store.clone(),
            self.hub.clone(),
            self.user_id.clone(),
            Duration::from_millis(self.config.poll_interval_ms),
        );
        self.tasks.push(bridge.spawn());
        self.tasks.push(self.orchestrator.spawn_session_feed());
        self.tasks
            .push(self.notifier.clone().run(self.lifecycle.subscribe()));
    }

    /// Submit one job and wait for its terminal outcome, echoing the
    /// notification surfaces to the log as they change.
    pub async fn submit_and_wait(&self, request: SubmitRequest) -> AppResult<JobId> {
        let mut events = self.lifecycle.subscribe();

        let job_id = self.orchestrator.submit(request).await?;
        info!(%job_id, "Job admitted");

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Lifecycle stream lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(AppError::Config("Lifecycle stream closed".to_string()));
                }
            };

            if let Some(line) = self.notifier.status_line() {
                info!(status = %line);
            }

            match event {
                LifecycleEvent::Completed { job } if job.id == job_id => {
                    info!(%job_id, result = %job.result, "Analysis complete");
                    return Ok(job_id);
                }
                LifecycleEvent::Failed {
                    job_id: failed_id,
                    message,
                    ..
                } if failed_id == job_id => {
                    error!(%job_id, %message, "Analysis failed");
                    return Ok(job_id);
                }
                _ => {}
            }
        }
    }

    /// Dismiss a job from every surface.
    pub fn acknowledge(&self, job_id: JobId) {
        self.orchestrator.acknowledge(job_id);
    }

    /// Abort background tasks. Job state is server-side; nothing to flush.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Shutdown complete");
    }
}
