//! Talk catalog entries and per-speaker talk assignments.

use serde::{Deserialize, Serialize};

use super::default_true;

/// A numbered public talk from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Talk {
    pub id: u32,
    pub title: String,
}

/// A catalog talk that a speaker is prepared to give.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TalkAssignment {
    pub id: u32,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_date: Option<String>,
}

impl TalkAssignment {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            available: true,
            assigned_date: None,
        }
    }
}
