//! Row-change event types.

use alphadesk_core::{JobId, JobRow, UserId};
use serde::{Deserialize, Serialize};

/// Kind of row-level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedEventKind {
    Insert,
    Update,
}

/// A row-level change, delivered as the whole `new` row image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    pub kind: FeedEventKind,
    #[serde(rename = "new")]
    pub row: JobRow,
}

impl FeedEvent {
    pub fn insert(row: JobRow) -> Self {
        Self {
            kind: FeedEventKind::Insert,
            row,
        }
    }

    pub fn update(row: JobRow) -> Self {
        Self {
            kind: FeedEventKind::Update,
            row,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.row.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.row.user_id
    }
}
