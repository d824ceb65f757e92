//! Data models for the speaker roster.
//!
//! Field names follow the portable export format so the same types serialize
//! straight into export payloads and API responses.

mod settings;
mod snapshot;
mod speaker;
mod talk;

pub use settings::*;
pub use snapshot::*;
pub use speaker::*;
pub use talk::*;

/// Trim a user-supplied value, mapping blank input to `None`.
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub(crate) fn default_true() -> bool {
    true
}
