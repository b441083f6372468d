//! Synthetic progress sequencer.
//!
//! While a job is pending or running and the backend has not sent any real
//! progress message, the simulator applies the feature's script steps at
//! randomized intervals. The moment real telemetry is observed the id is
//! muted permanently: the running task is aborted and a per-id flag keeps
//! any timer that was already sleeping from applying its step.

use crate::script::ProgressScript;
use alphadesk_core::JobId;
use alphadesk_telemetry::metrics;
use dashmap::DashMap;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

struct SimEntry {
    muted: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Per-job synthetic progress timers, keyed by job id.
///
/// All contention is within a single id; entries for different jobs never
/// interact.
#[derive(Default)]
pub struct ProgressSimulator {
    jobs: DashMap<JobId, SimEntry>,
}

impl ProgressSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start walking `script` for a job, applying each step through `apply`.
    ///
    /// A second start for the same id is ignored, including after a mute:
    /// once real telemetry has been seen for an id the simulator must never
    /// re-activate for it.
    pub fn start<F>(&self, job_id: JobId, script: ProgressScript, apply: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        if self.jobs.contains_key(&job_id) {
            debug!(%job_id, "Simulator already tracking id; start ignored");
            return;
        }

        let muted = Arc::new(AtomicBool::new(false));
        let muted_task = muted.clone();

        let handle = tokio::spawn(async move {
            for step in script.steps {
                let delay = {
                    let mut rng = rand::thread_rng();
                    rng.gen_range(step.min_delay..=step.max_delay)
                };
                tokio::time::sleep(delay).await;

                // The flag is inspected immediately before every apply so a
                // timer that was already sleeping when real telemetry
                // arrived goes silent instead of overwriting it.
                if muted_task.load(Ordering::SeqCst) {
                    return;
                }

                trace!(%job_id, text = %step.text, "Applying simulated progress");
                metrics::SIMULATOR_STEPS.inc();
                apply(step.text);
            }
            // Script exhausted: stay silent, never loop.
        });

        self.jobs.insert(job_id, SimEntry { muted, handle });
    }

    /// Permanently disable simulation for an id (real telemetry observed).
    ///
    /// The entry is kept so a later `start` for the same id stays a no-op.
    pub fn mute(&self, job_id: JobId) {
        if let Some(entry) = self.jobs.get(&job_id) {
            if !entry.muted.swap(true, Ordering::SeqCst) {
                debug!(%job_id, "Simulator muted by real progress");
            }
            entry.handle.abort();
        }
    }

    /// Cancel all timers for an id and forget it (terminal state or
    /// user dismissal).
    pub fn cancel(&self, job_id: JobId) {
        if let Some((_, entry)) = self.jobs.remove(&job_id) {
            entry.muted.store(true, Ordering::SeqCst);
            entry.handle.abort();
            debug!(%job_id, "Simulator cancelled");
        }
    }

    /// Whether the id is tracked and not muted.
    pub fn is_active(&self, job_id: JobId) -> bool {
        self.jobs
            .get(&job_id)
            .map(|entry| !entry.muted.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Whether the id has been muted.
    pub fn is_muted(&self, job_id: JobId) -> bool {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.muted.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}
