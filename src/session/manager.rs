//! One session per identity, opened on demand and released when idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Session, SessionOptions};
use crate::catalog::TalkCatalog;
use crate::db::Repository;
use crate::errors::AppError;

const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(10);

pub struct SessionManager {
    repo: Repository,
    catalog: Arc<TalkCatalog>,
    options: SessionOptions,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(repo: Repository, catalog: Arc<TalkCatalog>, options: SessionOptions) -> Self {
        Self {
            repo,
            catalog,
            options,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<TalkCatalog> {
        &self.catalog
    }

    /// Return the identity's open session, opening a new one if needed.
    ///
    /// Opening happens outside the map lock; when two requests race, the
    /// first session inserted wins and the other is closed again.
    pub async fn get_or_open(&self, identity: &str) -> Result<Arc<Session>, AppError> {
        if let Some(session) = self.lookup(identity).await {
            return Ok(session);
        }

        let opened = Arc::new(
            Session::open(
                self.repo.clone(),
                Arc::clone(&self.catalog),
                identity,
                self.options.clone(),
            )
            .await?,
        );

        let mut sessions = self.sessions.lock().await;
        let existing = sessions
            .get(opened.identity())
            .filter(|s| !s.is_closed())
            .cloned();
        match existing {
            Some(existing) => {
                drop(sessions);
                opened.close().await;
                existing.touch();
                Ok(existing)
            }
            None => {
                sessions.insert(opened.identity().to_string(), Arc::clone(&opened));
                Ok(opened)
            }
        }
    }

    async fn lookup(&self, identity: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.lock().await;
        let session = sessions.get(identity.trim())?;
        if session.is_closed() {
            return None;
        }
        session.touch();
        Some(Arc::clone(session))
    }

    /// Close and forget the identity's session. Returns false when none was open.
    pub async fn close(&self, identity: &str) -> bool {
        let session = self.sessions.lock().await.remove(identity.trim());
        match session {
            Some(session) => {
                session.close().await;
                true
            }
            None => false,
        }
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Close sessions nobody watches that have been unused for the idle TTL.
    /// Returns how many were released.
    pub async fn sweep_idle(&self) -> usize {
        let ttl = self.options.idle_ttl;
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().await;
            let idle: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.is_closed() || (!s.has_watchers() && s.idle_for() >= ttl))
                .map(|(identity, _)| identity.clone())
                .collect();
            idle.iter()
                .filter_map(|identity| sessions.remove(identity))
                .collect()
        };

        for session in &expired {
            session.close().await;
        }
        if !expired.is_empty() {
            tracing::info!("Released {} idle sessions", expired.len());
        }
        expired.len()
    }

    /// Run [`sweep_idle`](Self::sweep_idle) periodically until cancelled.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = manager
            .options
            .idle_ttl
            .clamp(MIN_SWEEP_PERIOD, MAX_SWEEP_PERIOD);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.sweep_idle().await;
                    }
                }
            }
            tracing::debug!("Session sweeper stopped");
        })
    }

    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .lock()
            .await
            .drain()
            .map(|(_, session)| session)
            .collect();

        for session in &sessions {
            session.close().await;
        }
        tracing::info!("Closed {} sessions", sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn manager(options: SessionOptions) -> (TempDir, SessionManager) {
        let temp_dir = TempDir::new().unwrap();
        let pool = crate::db::init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let manager = SessionManager::new(
            Repository::new(pool),
            Arc::new(TalkCatalog::bundled().unwrap()),
            options,
        );
        (temp_dir, manager)
    }

    fn short_ttl() -> SessionOptions {
        SessionOptions {
            idle_ttl: Duration::from_millis(50),
            ..SessionOptions::default()
        }
    }

    #[tokio::test]
    async fn test_sessions_are_reused_per_identity() {
        let (_dir, manager) = manager(SessionOptions::default()).await;

        let a = manager.get_or_open("alice").await.unwrap();
        let again = manager.get_or_open("alice").await.unwrap();
        let b = manager.get_or_open("bob").await.unwrap();

        assert!(Arc::ptr_eq(&a, &again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(manager.open_count().await, 2);

        assert!(manager.close("alice").await);
        assert!(a.is_closed());
        assert!(!manager.close("alice").await);

        manager.close_all().await;
        assert!(b.is_closed());
        assert_eq!(manager.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_opens_share_one_session() {
        let (_dir, manager) = manager(SessionOptions::default()).await;

        let (a, b) = tokio::join!(manager.get_or_open("alice"), manager.get_or_open("alice"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!a.is_closed());
        assert_eq!(manager.open_count().await, 1);
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_idle_sessions_are_released() {
        let (_dir, manager) = manager(short_ttl()).await;

        let mut anonymous = Vec::new();
        for i in 0..20 {
            anonymous.push(manager.get_or_open(&format!("anon-{}", i)).await.unwrap());
        }
        let watched = manager.get_or_open("watched").await.unwrap();
        let _events = watched.watch();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(manager.sweep_idle().await, 20);

        assert!(anonymous.iter().all(|s| s.is_closed()));
        assert!(!watched.is_closed());
        assert_eq!(manager.open_count().await, 1);

        // A later request opens a fresh session
        let reopened = manager.get_or_open("anon-0").await.unwrap();
        assert!(!reopened.is_closed());
        assert!(!Arc::ptr_eq(&reopened, &anonymous[0]));
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_recent_use_keeps_session_open() {
        let (_dir, manager) = manager(short_ttl()).await;
        let session = manager.get_or_open("alice").await.unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        manager.get_or_open("alice").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(manager.sweep_idle().await, 0);
        assert!(!session.is_closed());
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_sweeper_runs_until_cancelled() {
        let (_dir, manager) = manager(short_ttl()).await;
        let manager = Arc::new(manager);
        let session = manager.get_or_open("alice").await.unwrap();

        let cancel = CancellationToken::new();
        let sweeper = manager.spawn_sweeper(cancel.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(session.is_closed());
        assert_eq!(manager.open_count().await, 0);

        cancel.cancel();
        sweeper.await.unwrap();
    }
}
