//! Session context for one identity.
//!
//! A session owns the live model of the identity's roster. Opening it loads
//! the configuration, subscribes to the store and spawns two tasks bound to a
//! cancellation token: the snapshot consumer and the debounced settings
//! writer. Closing it cancels both.

mod debounce;
mod manager;
mod model;
mod mutations;

pub use manager::SessionManager;
pub use model::RosterModel;

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::catalog::TalkCatalog;
use crate::db::{collection_path, Repository, Subscription};
use crate::errors::AppError;
use crate::models::{RosterSettings, SettingsPatch};
use debounce::{SettingsCommand, SettingsWriter};

/// Tunables for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Trailing-edge debounce window for configuration writes.
    pub settings_debounce: Duration,
    /// Upper bound on waiting for the model to catch up with a write.
    pub sync_timeout: Duration,
    /// Unwatched sessions unused for this long are released.
    pub idle_ttl: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            settings_debounce: Duration::from_millis(800),
            sync_timeout: Duration::from_secs(2),
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

pub struct Session {
    identity: String,
    repo: Repository,
    catalog: Arc<TalkCatalog>,
    model: Arc<watch::Sender<RosterModel>>,
    settings_tx: mpsc::UnboundedSender<SettingsCommand>,
    cancel: CancellationToken,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    last_used: StdMutex<Instant>,
    options: SessionOptions,
}

impl Session {
    /// Open a session: read the configuration once, subscribe to the roster
    /// and start the consumer loop and settings writer.
    pub async fn open(
        repo: Repository,
        catalog: Arc<TalkCatalog>,
        identity: &str,
        options: SessionOptions,
    ) -> Result<Self, AppError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(AppError::NotAuthenticated);
        }

        let settings = repo.get_settings(identity).await?.unwrap_or_default();
        let mut subscription = repo.subscribe(identity).await?;

        let mut model = RosterModel::with_settings(settings);
        if let Some(Ok(initial)) = subscription.next().await {
            model.apply_snapshot(initial);
        }

        let (model_tx, _) = watch::channel(model);
        let model = Arc::new(model_tx);
        let cancel = CancellationToken::new();
        let (settings_tx, settings_rx) = mpsc::unbounded_channel();

        let consumer = tokio::spawn(consume_snapshots(
            subscription,
            Arc::clone(&model),
            cancel.clone(),
        ));
        let writer = SettingsWriter {
            repo: repo.clone(),
            identity: identity.to_string(),
            model: Arc::clone(&model),
            window: options.settings_debounce,
            cancel: cancel.clone(),
        };
        let writer = tokio::spawn(writer.run(settings_rx));

        tracing::info!(path = %collection_path(identity), "Session opened");

        Ok(Self {
            identity: identity.to_string(),
            repo,
            catalog,
            model,
            settings_tx,
            cancel,
            tasks: StdMutex::new(vec![consumer, writer]),
            last_used: StdMutex::new(Instant::now()),
            options,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn catalog(&self) -> &TalkCatalog {
        &self.catalog
    }

    pub(crate) fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Mark the session as used now.
    pub fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .elapsed()
    }

    /// True while an event stream or a pending sync observes the model.
    pub fn has_watchers(&self) -> bool {
        self.model.receiver_count() > 0
    }

    /// Copy of the current model.
    pub fn current(&self) -> RosterModel {
        self.model.borrow().clone()
    }

    /// Receiver that observes every model update.
    pub fn watch(&self) -> watch::Receiver<RosterModel> {
        self.model.subscribe()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_closed() {
            Err(AppError::NotAuthenticated)
        } else {
            Ok(())
        }
    }

    /// Wait until the model reflects `revision`. Gives up after the sync
    /// timeout; the model then catches up on its own.
    /// Returns at once when the session is closed.
    pub async fn sync_to(&self, revision: i64) {
        let mut rx = self.model.subscribe();
        let waited = tokio::select! {
            _ = self.cancel.cancelled() => return,
            waited = tokio::time::timeout(
                self.options.sync_timeout,
                rx.wait_for(|m| m.revision >= revision),
            ) => waited,
        };

        if waited.is_err() {
            tracing::warn!(
                identity = %self.identity,
                revision,
                "Model did not reach revision before timeout"
            );
        }
    }

    /// Apply a configuration edit locally and schedule the debounced write.
    pub fn edit_settings(&self, patch: SettingsPatch) -> Result<RosterSettings, AppError> {
        self.ensure_open()?;
        patch.validate()?;
        if patch.is_empty() {
            return Ok(self.model.borrow().settings.clone());
        }

        let mut updated = RosterSettings::default();
        self.model.send_modify(|m| {
            m.settings.apply(&patch);
            updated = m.settings.clone();
        });

        self.settings_tx
            .send(SettingsCommand::Edit(patch))
            .map_err(|_| AppError::NotAuthenticated)?;
        Ok(updated)
    }

    /// Issue any scheduled configuration write now and wait for it.
    pub async fn flush_settings(&self) -> Result<(), AppError> {
        self.ensure_open()?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.settings_tx
            .send(SettingsCommand::Flush(reply_tx))
            .map_err(|_| AppError::NotAuthenticated)?;
        reply_rx.await.map_err(|_| AppError::NotAuthenticated)?
    }

    /// Write a configuration patch straight to the store, bypassing the
    /// debounce, and adopt the stored result.
    pub(crate) async fn store_settings(
        &self,
        patch: &SettingsPatch,
    ) -> Result<RosterSettings, AppError> {
        let stored = self.repo.set_settings(&self.identity, patch).await?;
        if !self.is_closed() {
            self.model.send_modify(|m| m.settings = stored.clone());
        }
        Ok(stored)
    }

    pub fn dismiss_notice(&self) {
        self.model.send_if_modified(|m| m.notice.take().is_some());
    }

    /// Record a failed operation as the user-visible notice and pass it on.
    pub(crate) fn notice<T>(&self, result: Result<T, AppError>) -> Result<T, AppError> {
        if let Err(e) = &result {
            if !self.is_closed() {
                self.model.send_modify(|m| m.set_notice(e.message()));
            }
        }
        result
    }

    /// Tear the session down. Scheduled configuration writes are flushed
    /// first; snapshots and write results arriving afterwards are discarded.
    pub async fn close(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();

        let tasks: Vec<JoinHandle<()>> = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(identity = %self.identity, "Session task ended abnormally: {}", e);
            }
        }

        tracing::info!(path = %collection_path(&self.identity), "Session closed");
    }
}

/// Single consumer of the roster subscription.
async fn consume_snapshots(
    mut subscription: Subscription,
    model: Arc<watch::Sender<RosterModel>>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = subscription.next() => event,
        };

        match event {
            Some(Ok(snapshot)) => {
                if cancel.is_cancelled() {
                    break;
                }
                model.send_if_modified(|m| m.apply_snapshot(snapshot));
            }
            Some(Err(e)) => {
                // Keep the last good snapshot.
                tracing::warn!(identity = %subscription.identity(), "Roster subscription error: {}", e);
                model.send_modify(|m| m.set_notice(e.message()));
            }
            None => {
                tracing::warn!(identity = %subscription.identity(), "Roster subscription ended");
                break;
            }
        }
    }
}
