//! Projection of lifecycle events into notification state.

use crate::types::{Flash, Severity, Toast};
use alphadesk_core::JobId;
use alphadesk_jobs::LifecycleEvent;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

/// Notification configuration.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// How long a flash stays visible.
    pub flash_ttl: Duration,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            flash_ttl: Duration::from_secs(6),
        }
    }
}

/// Read-model of every user-visible notification surface.
///
/// Consumes the lifecycle event stream and exposes snapshot accessors for
/// the UI. Pure projection: it never mutates jobs.
pub struct NotificationCenter {
    config: NotifyConfig,
    next_id: AtomicU64,
    flashes: RwLock<Vec<Flash>>,
    toasts: RwLock<Vec<Toast>>,
    status_line: RwLock<Option<String>>,
    active_ids: RwLock<HashSet<JobId>>,
}

impl NotificationCenter {
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            flashes: RwLock::new(Vec::new()),
            toasts: RwLock::new(Vec::new()),
            status_line: RwLock::new(None),
            active_ids: RwLock::new(HashSet::new()),
        }
    }

    /// Spawn the consumer task for a lifecycle event stream.
    pub fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<LifecycleEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.handle_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Notification stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Apply one lifecycle event to the surfaces.
    pub fn handle_event(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Submitted { job } => {
                self.active_ids.write().insert(job.id);
                self.push_flash(
                    Severity::Info,
                    format!("Started {} analysis for {}", job.feature, job.instrument),
                );
                self.refresh_status_line(None);
            }
            LifecycleEvent::Progress { message, .. } => {
                self.refresh_status_line(Some(message.clone()));
            }
            LifecycleEvent::Completed { job } => {
                self.active_ids.write().remove(&job.id);
                self.push_flash(
                    Severity::Success,
                    format!("Analysis ready for {}", job.instrument),
                );
                self.refresh_status_line(None);
            }
            LifecycleEvent::Failed {
                job_id,
                feature,
                instrument,
                message,
            } => {
                self.active_ids.write().remove(job_id);
                self.toasts.write().push(Toast {
                    id: self.next_id(),
                    job_id: *job_id,
                    message: format!("{instrument}: {message}"),
                    retry: Some(*feature),
                    created_at: Utc::now(),
                });
                self.refresh_status_line(None);
            }
            LifecycleEvent::AdmissionDenied { message, .. } => {
                self.push_flash(Severity::Destructive, message.clone());
            }
            LifecycleEvent::Acknowledged { job_id } => {
                self.active_ids.write().remove(job_id);
                self.toasts.write().retain(|toast| toast.job_id != *job_id);
                self.refresh_status_line(None);
            }
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn push_flash(&self, severity: Severity, message: String) {
        self.flashes.write().push(Flash {
            id: self.next_id(),
            severity,
            message,
            created_at: Utc::now(),
        });
    }

    fn refresh_status_line(&self, progress: Option<String>) {
        let mut line = self.status_line.write();
        if let Some(message) = progress {
            *line = Some(message);
            return;
        }
        let running = self.active_ids.read().len();
        *line = match running {
            0 => None,
            1 => Some("1 analysis running".to_string()),
            n => Some(format!("{n} analyses running")),
        };
    }

    fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - ChronoDuration::from_std(self.config.flash_ttl)
            .unwrap_or_else(|_| ChronoDuration::seconds(6))
    }

    /// Currently visible flashes; expired ones are pruned on read.
    pub fn visible_flashes(&self) -> Vec<Flash> {
        let cutoff = self.expiry_cutoff(Utc::now());
        let mut flashes = self.flashes.write();
        flashes.retain(|flash| flash.created_at > cutoff);
        flashes.clone()
    }

    /// Persistent toasts; only explicit dismissal removes them.
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.read().clone()
    }

    /// Dismiss one toast by its id.
    pub fn dismiss_toast(&self, toast_id: u64) {
        self.toasts.write().retain(|toast| toast.id != toast_id);
    }

    /// The discreet top-of-page summary.
    pub fn status_line(&self) -> Option<String> {
        self.status_line.read().clone()
    }
}
