//! Trailing-edge debounced configuration writes.
//!
//! A burst of edits inside the window produces a single `set_settings` call,
//! issued once the window closes after the last edit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use super::model::RosterModel;
use crate::db::Repository;
use crate::errors::AppError;
use crate::models::SettingsPatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    Scheduled(Instant),
    InFlight,
}

/// Pending-write state machine.
///
/// Edits accumulate into one patch and push the deadline back. When the
/// deadline passes the patch is taken for a single write; edits made while
/// that write is in flight are scheduled again once it completes.
#[derive(Debug)]
pub struct PendingSettings {
    window: Duration,
    patch: Option<SettingsPatch>,
    deadline: Option<Instant>,
    in_flight: bool,
}

impl PendingSettings {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            patch: None,
            deadline: None,
            in_flight: false,
        }
    }

    pub fn state(&self) -> WriteState {
        match (self.in_flight, self.deadline) {
            (true, _) => WriteState::InFlight,
            (false, Some(deadline)) => WriteState::Scheduled(deadline),
            (false, None) => WriteState::Idle,
        }
    }

    pub fn edit(&mut self, patch: SettingsPatch, now: Instant) {
        match &mut self.patch {
            Some(pending) => pending.merge(patch),
            None => self.patch = Some(patch),
        }
        self.deadline = Some(now + self.window);
    }

    /// Deadline of the scheduled write, if one is waiting to be issued.
    pub fn deadline(&self) -> Option<Instant> {
        if self.in_flight {
            None
        } else {
            self.deadline
        }
    }

    /// Take the patch if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<SettingsPatch> {
        match self.deadline() {
            Some(deadline) if deadline <= now => self.take_now(),
            _ => None,
        }
    }

    /// Take the patch regardless of the deadline.
    pub fn take_now(&mut self) -> Option<SettingsPatch> {
        if self.in_flight {
            return None;
        }
        let patch = self.patch.take()?;
        self.deadline = None;
        self.in_flight = true;
        Some(patch)
    }

    /// Mark the in-flight write as finished.
    pub fn complete(&mut self) {
        self.in_flight = false;
        if self.patch.is_none() {
            self.deadline = None;
        }
    }
}

pub(crate) enum SettingsCommand {
    Edit(SettingsPatch),
    /// Issue any pending write now and report its outcome.
    Flush(oneshot::Sender<Result<(), AppError>>),
}

pub(crate) struct SettingsWriter {
    pub repo: Repository,
    pub identity: String,
    pub model: Arc<watch::Sender<RosterModel>>,
    pub window: Duration,
    pub cancel: CancellationToken,
}

impl SettingsWriter {
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<SettingsCommand>) {
        let mut pending = PendingSettings::new(self.window);

        loop {
            let deadline = pending.deadline();

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    // Edits queued before close still belong to this session.
                    while let Ok(command) = rx.try_recv() {
                        if let SettingsCommand::Edit(patch) = command {
                            pending.edit(patch, Instant::now());
                        }
                    }
                    if let Some(patch) = pending.take_now() {
                        let _ = self.persist(&patch).await;
                        pending.complete();
                    }
                    break;
                }
                command = rx.recv() => match command {
                    Some(SettingsCommand::Edit(patch)) => {
                        pending.edit(patch, Instant::now());
                        tracing::debug!(
                            identity = %self.identity,
                            state = ?pending.state(),
                            "Settings edit queued"
                        );
                    }
                    Some(SettingsCommand::Flush(reply)) => {
                        let result = match pending.take_now() {
                            Some(patch) => {
                                let result = self.persist(&patch).await.map(|_| ());
                                pending.complete();
                                result
                            }
                            None => Ok(()),
                        };
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Some(patch) = pending.take_now() {
                            let _ = self.persist(&patch).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(patch) = pending.take_due(Instant::now()) {
                        let _ = self.persist(&patch).await;
                        pending.complete();
                    }
                }
            }
        }

        tracing::debug!(identity = %self.identity, "Settings writer stopped");
    }

    /// Write the patch. Results arriving after close are not applied.
    async fn persist(&self, patch: &SettingsPatch) -> Result<(), AppError> {
        tracing::debug!(identity = %self.identity, "Writing debounced settings");

        match self.repo.set_settings(&self.identity, patch).await {
            Ok(stored) => {
                if !self.cancel.is_cancelled() {
                    self.model.send_modify(|m| {
                        m.settings.version = stored.version;
                        m.settings.updated_at = stored.updated_at.clone();
                    });
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(identity = %self.identity, "Settings write failed: {}", e);
                if !self.cancel.is_cancelled() {
                    self.model.send_modify(|m| m.set_notice(e.message()));
                }
                Err(e)
            }
        }
    }
}
