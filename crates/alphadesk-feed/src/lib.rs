//! Change-feed event model and in-process fan-out.
//!
//! The backend pushes row-level INSERT/UPDATE notifications for the job
//! table, scoped to the authenticated user. This crate models those events
//! as whole-row snapshots and fans them out to any number of subscribers:
//! the single session-wide lifecycle subscription plus the temporary
//! per-submission subscriptions opened by the dual-transport resolver.

pub mod event;
pub mod hub;

pub use event::{FeedEvent, FeedEventKind};
pub use hub::{FeedHub, FeedSubscription};
