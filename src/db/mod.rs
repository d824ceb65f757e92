//! Roster store backed by SQLite.
//!
//! The store is the durable owner of every roster; sessions only hold a
//! projection of the latest snapshot it published.

mod repository;
mod subscription;

pub use repository::*;
pub use subscription::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roster_meta (
            identity TEXT PRIMARY KEY,
            revision INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS speakers (
            identity TEXT NOT NULL,
            id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            family_name TEXT NOT NULL,
            phone TEXT,
            role TEXT NOT NULL,
            available INTEGER NOT NULL DEFAULT 1,
            talks TEXT NOT NULL DEFAULT '[]',
            created_at TEXT,
            updated_at TEXT,
            PRIMARY KEY (identity, id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roster_settings (
            identity TEXT PRIMARY KEY,
            congregation_name TEXT,
            contact_name TEXT,
            contact_phone TEXT,
            meeting_day TEXT NOT NULL DEFAULT 'domingo',
            meeting_time TEXT NOT NULL DEFAULT '10:00',
            add_date_stamp INTEGER NOT NULL DEFAULT 0,
            google_maps_url TEXT,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS talks (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_speakers_identity ON speakers(identity);
        CREATE INDEX IF NOT EXISTS idx_speakers_family_name ON speakers(identity, family_name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Logical collection path of an identity's speaker documents.
pub fn collection_path(identity: &str) -> String {
    format!("users/{}/speakers", identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_path_is_scoped_by_identity() {
        assert_eq!(collection_path("abc"), "users/abc/speakers");
        assert_ne!(collection_path("a"), collection_path("b"));
    }
}
