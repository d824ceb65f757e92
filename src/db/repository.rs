//! Database repository for roster documents.
//!
//! Every speaker write runs in a transaction that also bumps the identity's
//! revision; the resulting snapshot is published to subscribers before the
//! write lock is released, so subscribers observe writes in commit order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use tokio::sync::{broadcast, Mutex};

use super::{collection_path, SnapshotEvent, Subscription};
use crate::errors::AppError;
use crate::models::{
    MeetingDay, NewSpeaker, RosterSettings, RosterSnapshot, SettingsPatch, Speaker, SpeakerPatch,
    Talk, TalkAssignment,
};

/// Buffered snapshots per identity before slow subscribers start lagging.
const SUBSCRIPTION_CAPACITY: usize = 64;

const SPEAKER_COLUMNS: &str =
    "id, first_name, family_name, phone, role, available, talks, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "congregation_name, contact_name, contact_phone, meeting_day, meeting_time, add_date_stamp, google_maps_url, updated_at, version";

/// A committed write together with the roster revision it produced.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    pub revision: i64,
}

/// Database repository for all roster operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
    channels: Arc<StdMutex<HashMap<String, broadcast::Sender<SnapshotEvent>>>>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
            channels: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Close the underlying pool. Later operations fail with a store error.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ==================== SUBSCRIPTIONS ====================

    /// Subscribe to the identity's roster.
    pub async fn subscribe(&self, identity: &str) -> Result<Subscription, AppError> {
        // Hold the write lock so no commit slips between the initial snapshot
        // and the receiver registration.
        let _guard = self.write_lock.lock().await;

        let rx = {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            channels
                .entry(identity.to_string())
                .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CAPACITY).0)
                .subscribe()
        };

        let initial = self.snapshot(identity).await?;
        tracing::debug!(path = %collection_path(identity), revision = initial.revision, "Subscribed to roster");

        Ok(Subscription::new(identity.to_string(), initial, rx))
    }

    /// Number of live subscriptions for an identity.
    pub fn subscriber_count(&self, identity: &str) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(identity)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Send the current snapshot to subscribers. Callers hold the write lock.
    async fn publish(&self, identity: &str) {
        let sender = {
            let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
            match channels.get(identity) {
                Some(tx) if tx.receiver_count() == 0 => {
                    channels.remove(identity);
                    None
                }
                Some(tx) => Some(tx.clone()),
                None => None,
            }
        };
        let Some(sender) = sender else {
            return;
        };

        let event = self.snapshot(identity).await;
        if let Err(e) = &event {
            tracing::warn!(path = %collection_path(identity), "Failed to read roster snapshot: {}", e);
        }
        let _ = sender.send(event);
    }

    // ==================== ROSTER READS ====================

    /// Get the identity's current roster revision.
    pub async fn get_revision(&self, identity: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision FROM roster_meta WHERE identity = ?")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("revision")).unwrap_or(0))
    }

    /// Read the full roster together with its revision.
    pub async fn snapshot(&self, identity: &str) -> Result<RosterSnapshot, AppError> {
        let revision = self.get_revision(identity).await?;
        let speakers = self.list_speakers(identity).await?;
        Ok(RosterSnapshot { revision, speakers })
    }

    /// List all speakers of an identity.
    pub async fn list_speakers(&self, identity: &str) -> Result<Vec<Speaker>, AppError> {
        let sql = format!(
            "SELECT {} FROM speakers WHERE identity = ? ORDER BY family_name, first_name, id",
            SPEAKER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(identity)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(speaker_from_row).collect())
    }

    /// Get a speaker by ID.
    pub async fn get_speaker(&self, identity: &str, id: &str) -> Result<Option<Speaker>, AppError> {
        let sql = format!(
            "SELECT {} FROM speakers WHERE identity = ? AND id = ?",
            SPEAKER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identity)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(speaker_from_row))
    }

    // ==================== SPEAKER WRITES ====================

    /// Create a new speaker with a store-assigned ID, available and without talks.
    pub async fn add_speaker(
        &self,
        identity: &str,
        request: &NewSpeaker,
    ) -> Result<Committed<Speaker>, AppError> {
        let now = Utc::now().to_rfc3339();
        let speaker = Speaker {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: request.first_name.clone(),
            family_name: request.family_name.clone(),
            phone: request.phone.as_deref().and_then(crate::models::non_empty),
            role: request.role.clone().unwrap_or_default(),
            available: true,
            talks: Vec::new(),
            created_at: Some(now.clone()),
            updated_at: Some(now),
        };

        let revision = self.upsert_speaker(identity, &speaker).await?;
        Ok(Committed {
            value: speaker,
            revision,
        })
    }

    /// Write a whole speaker document, creating or replacing it.
    pub async fn upsert_speaker(&self, identity: &str, speaker: &Speaker) -> Result<i64, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        write_speaker(&mut tx, identity, speaker).await?;
        let revision = bump_revision(&mut tx, identity).await?;
        tx.commit().await?;

        self.publish(identity).await;
        Ok(revision)
    }

    /// Merge-write a speaker: only the fields set in the patch change.
    pub async fn update_speaker(
        &self,
        identity: &str,
        id: &str,
        patch: &SpeakerPatch,
    ) -> Result<Committed<Speaker>, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM speakers WHERE identity = ? AND id = ?",
            SPEAKER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identity)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let mut speaker = row
            .as_ref()
            .map(speaker_from_row)
            .ok_or_else(|| AppError::NotFound(format!("Speaker {} not found", id)))?;

        patch.apply_to(&mut speaker, &now);
        write_speaker(&mut tx, identity, &speaker).await?;
        let revision = bump_revision(&mut tx, identity).await?;
        tx.commit().await?;

        self.publish(identity).await;
        Ok(Committed {
            value: speaker,
            revision,
        })
    }

    /// Delete a speaker document together with its talks.
    ///
    /// Returns `None` when the speaker did not exist; nothing is published then.
    pub async fn delete_speaker(&self, identity: &str, id: &str) -> Result<Option<i64>, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM speakers WHERE identity = ? AND id = ?")
            .bind(identity)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        let revision = bump_revision(&mut tx, identity).await?;
        tx.commit().await?;

        self.publish(identity).await;
        Ok(Some(revision))
    }

    /// Replace the whole roster: delete every speaker, then insert the given ones.
    pub async fn replace_roster(&self, identity: &str, speakers: &[Speaker]) -> Result<i64, AppError> {
        let _guard = self.write_lock.lock().await;

        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM speakers WHERE identity = ?")
            .bind(identity)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        for speaker in speakers {
            write_speaker(&mut tx, identity, speaker).await?;
        }

        let revision = bump_revision(&mut tx, identity).await?;
        tx.commit().await?;

        tracing::info!(
            path = %collection_path(identity),
            deleted,
            inserted = speakers.len(),
            revision,
            "Replaced roster"
        );

        self.publish(identity).await;
        Ok(revision)
    }

    // ==================== SETTINGS ====================

    /// Get the identity's settings document, if it was ever written.
    pub async fn get_settings(&self, identity: &str) -> Result<Option<RosterSettings>, AppError> {
        let sql = format!(
            "SELECT {} FROM roster_settings WHERE identity = ?",
            SETTINGS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(settings_from_row))
    }

    /// Merge a partial update into the settings document, creating it lazily.
    pub async fn set_settings(
        &self,
        identity: &str,
        patch: &SettingsPatch,
    ) -> Result<RosterSettings, AppError> {
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM roster_settings WHERE identity = ?",
            SETTINGS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(identity)
            .fetch_optional(&mut *tx)
            .await?;

        let mut settings = row.as_ref().map(settings_from_row).unwrap_or_default();
        settings.apply(patch);
        settings.updated_at = Some(now);
        settings.version += 1;

        sqlx::query(
            r#"INSERT INTO roster_settings
                (identity, congregation_name, contact_name, contact_phone, meeting_day,
                 meeting_time, add_date_stamp, google_maps_url, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(identity) DO UPDATE SET
                 congregation_name = excluded.congregation_name,
                 contact_name = excluded.contact_name,
                 contact_phone = excluded.contact_phone,
                 meeting_day = excluded.meeting_day,
                 meeting_time = excluded.meeting_time,
                 add_date_stamp = excluded.add_date_stamp,
                 google_maps_url = excluded.google_maps_url,
                 updated_at = excluded.updated_at,
                 version = excluded.version"#,
        )
        .bind(identity)
        .bind(&settings.congregation_name)
        .bind(&settings.contact_name)
        .bind(&settings.contact_phone)
        .bind(settings.meeting_day.as_str())
        .bind(&settings.meeting_time)
        .bind(settings.add_date_stamp as i32)
        .bind(&settings.google_maps_url)
        .bind(&settings.updated_at)
        .bind(settings.version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(identity, version = settings.version, "Saved roster settings");
        Ok(settings)
    }

    // ==================== TALK CATALOG ====================

    /// Upsert every catalog entry into the shared talks table.
    pub async fn save_catalog(&self, talks: &[Talk]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        for talk in talks {
            sqlx::query(
                "INSERT INTO talks (id, title) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET title = excluded.title",
            )
            .bind(i64::from(talk.id))
            .bind(&talk.title)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(talks.len())
    }

    /// List every catalog talk ordered by number.
    pub async fn list_catalog(&self) -> Result<Vec<Talk>, AppError> {
        let rows = sqlx::query("SELECT id, title FROM talks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(talk_from_row).collect())
    }

    /// Get a catalog talk by number.
    pub async fn get_catalog_talk(&self, id: u32) -> Result<Option<Talk>, AppError> {
        let row = sqlx::query("SELECT id, title FROM talks WHERE id = ?")
            .bind(i64::from(id))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().and_then(talk_from_row))
    }
}

// Helpers shared by the write paths

async fn write_speaker(
    conn: &mut SqliteConnection,
    identity: &str,
    speaker: &Speaker,
) -> Result<(), AppError> {
    let talks_json = serde_json::to_string(&speaker.talks)
        .map_err(|e| AppError::Internal(format!("Failed to encode talks: {}", e)))?;

    sqlx::query(
        r#"INSERT INTO speakers
            (identity, id, first_name, family_name, phone, role, available, talks, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(identity, id) DO UPDATE SET
             first_name = excluded.first_name,
             family_name = excluded.family_name,
             phone = excluded.phone,
             role = excluded.role,
             available = excluded.available,
             talks = excluded.talks,
             created_at = COALESCE(excluded.created_at, speakers.created_at),
             updated_at = excluded.updated_at"#,
    )
    .bind(identity)
    .bind(&speaker.id)
    .bind(&speaker.first_name)
    .bind(&speaker.family_name)
    .bind(&speaker.phone)
    .bind(&speaker.role)
    .bind(speaker.available as i32)
    .bind(&talks_json)
    .bind(&speaker.created_at)
    .bind(&speaker.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn bump_revision(conn: &mut SqliteConnection, identity: &str) -> Result<i64, AppError> {
    let now = Utc::now().to_rfc3339();
    let row = sqlx::query(
        r#"INSERT INTO roster_meta (identity, revision, updated_at) VALUES (?, 1, ?)
           ON CONFLICT(identity) DO UPDATE SET
             revision = roster_meta.revision + 1,
             updated_at = excluded.updated_at
           RETURNING revision"#,
    )
    .bind(identity)
    .bind(&now)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("revision"))
}

// Helper functions for row conversion

fn speaker_from_row(row: &SqliteRow) -> Speaker {
    let available: i32 = row.get("available");
    let talks_str: String = row.get("talks");
    Speaker {
        id: row.get("id"),
        first_name: row.get("first_name"),
        family_name: row.get("family_name"),
        phone: row.get("phone"),
        role: row.get("role"),
        available: available != 0,
        talks: parse_talks(&talks_str),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn settings_from_row(row: &SqliteRow) -> RosterSettings {
    let add_date_stamp: i32 = row.get("add_date_stamp");
    let meeting_day: String = row.get("meeting_day");
    RosterSettings {
        congregation_name: row.get("congregation_name"),
        contact_name: row.get("contact_name"),
        contact_phone: row.get("contact_phone"),
        meeting_day: MeetingDay::from_label(&meeting_day).unwrap_or_default(),
        meeting_time: row.get("meeting_time"),
        add_date_stamp: add_date_stamp != 0,
        google_maps_url: row.get("google_maps_url"),
        updated_at: row.get("updated_at"),
        version: row.get("version"),
    }
}

fn talk_from_row(row: &SqliteRow) -> Option<Talk> {
    let id: i64 = row.get("id");
    Some(Talk {
        id: u32::try_from(id).ok()?,
        title: row.get("title"),
    })
}

fn parse_talks(s: &str) -> Vec<TalkAssignment> {
    serde_json::from_str(s).unwrap_or_else(|e| {
        tracing::warn!("Discarding unreadable talk list: {}", e);
        Vec::new()
    })
}
