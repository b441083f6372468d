//! Polling bridge from the persisted job table to the in-process feed.
//!
//! The backend's push channel is not available in this runner, so the
//! bridge approximates it: it lists the user's rows on a fixed cadence,
//! diffs against the previous snapshot, and publishes Insert events for
//! new ids and Update events for changed rows. Rows that disappear
//! (deleted server-side) are dropped from the snapshot without an event;
//! the feed protocol carries no deletes.

use alphadesk_core::{JobId, JobRow, UserId};
use alphadesk_feed::{FeedEvent, FeedHub};
use alphadesk_gateway::JobStoreClient;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Diff a fresh listing against the previous snapshot.
///
/// Returns the events to publish, in listing order, and the new snapshot.
pub fn diff_snapshot(
    previous: &HashMap<JobId, JobRow>,
    rows: Vec<JobRow>,
) -> (Vec<FeedEvent>, HashMap<JobId, JobRow>) {
    let mut events = Vec::new();
    let mut next = HashMap::with_capacity(rows.len());

    for row in rows {
        match previous.get(&row.id) {
            None => events.push(FeedEvent::insert(row.clone())),
            Some(seen) if *seen != row => events.push(FeedEvent::update(row.clone())),
            Some(_) => {}
        }
        next.insert(row.id, row);
    }

    (events, next)
}

/// The polling task. One per session.
pub struct FeedBridge {
    store: Arc<JobStoreClient>,
    hub: FeedHub,
    user_id: UserId,
    poll_interval: Duration,
}

impl FeedBridge {
    pub fn new(
        store: Arc<JobStoreClient>,
        hub: FeedHub,
        user_id: UserId,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            user_id,
            poll_interval,
        }
    }

    /// Spawn the polling loop. A failed listing is logged and skipped;
    /// the snapshot is left untouched so the next successful poll emits
    /// whatever changed in the meantime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut snapshot: HashMap<JobId, JobRow> = HashMap::new();
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let rows = match self.store.list_for_user(&self.user_id).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(error = %e, "Job listing failed; keeping previous snapshot");
                        continue;
                    }
                };

                let (events, next) = diff_snapshot(&snapshot, rows);
                snapshot = next;

                for event in events {
                    debug!(job_id = %event.job_id(), kind = ?event.kind, "Bridging feed event");
                    self.hub.publish(event);
                }
            }
        })
    }
}
