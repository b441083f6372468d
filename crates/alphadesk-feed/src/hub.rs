//! Process-wide fan-out of change-feed events.
//!
//! One `FeedHub` exists per session. Whatever transport delivers row
//! changes (push subscription or the app's polling bridge) publishes into
//! the hub; subscribers receive only the rows owned by their user, matching
//! the server-side filter of a real push subscription.

use crate::event::FeedEvent;
use alphadesk_core::UserId;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out hub for job-row change events.
#[derive(Debug, Clone)]
pub struct FeedHub {
    tx: broadcast::Sender<FeedEvent>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a row change to all subscribers.
    ///
    /// Send errors mean no subscriber is currently attached, which is
    /// normal between sessions.
    pub fn publish(&self, event: FeedEvent) {
        match self.tx.send(event) {
            Ok(n) => trace!(receivers = n, "Feed event published"),
            Err(_) => trace!("No feed receivers attached"),
        }
    }

    /// Open a subscription filtered to one user's rows.
    pub fn subscribe(&self, user_id: UserId) -> FeedSubscription {
        FeedSubscription {
            rx: self.tx.subscribe(),
            user_id,
        }
    }

    /// Number of currently attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A user-scoped subscription to the change feed.
///
/// Dropping the subscription detaches it; the resolver drops its temporary
/// subscription as soon as the completion latch is claimed on either path.
pub struct FeedSubscription {
    rx: broadcast::Receiver<FeedEvent>,
    user_id: UserId,
}

impl FeedSubscription {
    /// Receive the next event for this subscription's user.
    ///
    /// Returns `None` once the hub is gone. Lagged receivers skip the
    /// overwritten events and keep going; every event carries a whole-row
    /// snapshot, so a later event supersedes anything missed.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if *event.user_id() == self.user_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Feed subscription lagged; continuing from latest");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}
