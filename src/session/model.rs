//! In-memory projection of one identity's roster.

use serde::Serialize;

use crate::models::{RosterSettings, RosterSnapshot, Speaker};

/// Latest roster snapshot plus the locally edited configuration.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterModel {
    /// False until the first snapshot arrived.
    pub loaded: bool,
    pub revision: i64,
    pub speakers: Vec<Speaker>,
    pub settings: RosterSettings,
    /// Single user-visible message from the last failed operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl RosterModel {
    pub fn with_settings(settings: RosterSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    /// Replace the speaker set with a snapshot. Snapshots older than the
    /// current revision are ignored; returns whether the model changed.
    pub fn apply_snapshot(&mut self, snapshot: RosterSnapshot) -> bool {
        if self.loaded && snapshot.revision < self.revision {
            return false;
        }
        self.revision = snapshot.revision;
        self.speakers = snapshot.speakers;
        self.loaded = true;
        true
    }

    pub fn speaker(&self, id: &str) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == id)
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }
}
