//! Full-roster snapshots emitted by the store's live subscription.

use serde::{Deserialize, Serialize};

use super::Speaker;

/// The complete speaker set for one identity at a given store revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub revision: i64,
    pub speakers: Vec<Speaker>,
}

impl RosterSnapshot {
    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }
}
