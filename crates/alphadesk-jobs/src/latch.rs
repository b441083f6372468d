//! Single-claim completion latch registry.
//!
//! For every in-flight submission there is at most one latch entry. Both
//! transports (HTTP response parsing and the change-feed watcher) must go
//! through `claim` before invoking the terminal handler; the first caller
//! takes the handler, every later caller gets `AlreadySettled` and must
//! discard its locally-parsed result silently. That losing path is the
//! expected, common case whenever both channels answer.
//!
//! The test-and-set runs under the map's shard entry lock, so back-to-back
//! claims from the same tick or from different worker threads still yield
//! exactly one winner.

use alphadesk_core::{JobId, JobOutcome};
use alphadesk_telemetry::metrics;
use dashmap::DashMap;
use std::fmt;
use tracing::{debug, trace};

/// The terminal handler a winning transport executes with its locally
/// parsed outcome. Runs exactly once per job id. `Sync` because the
/// registry is shared across the resolver tasks behind an `Arc`.
pub type CompletionHandler = Box<dyn FnOnce(JobOutcome) + Send + Sync>;

struct LatchEntry {
    claimed: bool,
    handler: Option<CompletionHandler>,
}

/// Result of a claim attempt.
pub enum Claim {
    /// This caller won; it must run the handler with its outcome.
    Won(CompletionHandler),
    /// Another transport already settled this job; discard the result.
    AlreadySettled,
    /// No resolver ever raced this id (e.g. a job recovered from a
    /// previous session, observed only through the session feed).
    Unregistered,
}

impl Claim {
    pub fn is_won(&self) -> bool {
        matches!(self, Self::Won(_))
    }
}

impl fmt::Debug for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Won(_) => write!(f, "Won"),
            Self::AlreadySettled => write!(f, "AlreadySettled"),
            Self::Unregistered => write!(f, "Unregistered"),
        }
    }
}

/// Process-wide registry of single-use completion latches, keyed by job id.
///
/// Injected as a shared collaborator rather than ambient global state so
/// tests can run against a fresh instance.
#[derive(Default)]
pub struct CompletionLatch {
    entries: DashMap<JobId, LatchEntry>,
}

impl CompletionLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the terminal handler for a job about to race.
    ///
    /// Must happen before the triggering request is issued and before the
    /// per-submission feed subscription starts consuming events.
    pub fn register(&self, job_id: JobId, handler: CompletionHandler) {
        trace!(%job_id, "Latch registered");
        self.entries.insert(
            job_id,
            LatchEntry {
                claimed: false,
                handler: Some(handler),
            },
        );
    }

    /// Atomic test-and-set. The first caller per id takes the handler.
    pub fn claim(&self, job_id: JobId) -> Claim {
        let Some(mut entry) = self.entries.get_mut(&job_id) else {
            return Claim::Unregistered;
        };

        if entry.claimed {
            debug!(%job_id, "Latch already settled; claim rejected");
            metrics::LATCH_REJECTIONS.inc();
            return Claim::AlreadySettled;
        }

        entry.claimed = true;
        match entry.handler.take() {
            Some(handler) => Claim::Won(handler),
            // Registered entries always carry a handler until claimed.
            None => Claim::AlreadySettled,
        }
    }

    /// Whether a claim has already succeeded for this id.
    pub fn is_settled(&self, job_id: JobId) -> bool {
        self.entries
            .get(&job_id)
            .map(|entry| entry.claimed)
            .unwrap_or(false)
    }

    /// Whether an entry exists (claimed or not).
    pub fn is_registered(&self, job_id: JobId) -> bool {
        self.entries.contains_key(&job_id)
    }

    /// Drop the entry for a job. Used on user acknowledgement.
    pub fn clear(&self, job_id: JobId) {
        self.entries.remove(&job_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
