//! Live roster subscriptions.

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::errors::AppError;
use crate::models::RosterSnapshot;

/// One event on a roster subscription.
pub type SnapshotEvent = Result<RosterSnapshot, AppError>;

/// Stream of full-roster snapshots for one identity.
///
/// Yields the snapshot current at subscription time first, then one snapshot
/// per committed write in commit order. Dropping the subscription ends it.
pub struct Subscription {
    identity: String,
    initial: Option<RosterSnapshot>,
    rx: broadcast::Receiver<SnapshotEvent>,
}

impl Subscription {
    pub(crate) fn new(
        identity: String,
        initial: RosterSnapshot,
        rx: broadcast::Receiver<SnapshotEvent>,
    ) -> Self {
        Self {
            identity,
            initial: Some(initial),
            rx,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Wait for the next event. Returns `None` once the store side is gone.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(Ok(initial));
        }

        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    // Snapshots are complete, so the next one supersedes the skipped ones.
                    tracing::warn!(
                        identity = %self.identity,
                        skipped,
                        "Roster subscriber lagged behind"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = SnapshotEvent> {
        stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}
