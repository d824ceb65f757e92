//! Configuration module for the roster backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

const DEFAULT_DB_PATH: &str = "./data/roster.sqlite";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_DEBOUNCE_MS: u64 = 800;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
const DEFAULT_PHONE_PREFIX: &str = "+54";
const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Optional JSON file used to seed the talk catalog
    pub catalog_path: Option<PathBuf>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Debounce window for configuration writes
    pub settings_debounce: Duration,
    /// Unwatched sessions idle this long are released
    pub session_idle: Duration,
    /// Prefix printed before phone numbers in the shareable text
    pub phone_prefix: Option<String>,
    /// Offset used for "Actualizado" stamps
    pub utc_offset: FixedOffset,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_psk = lookup("ROSTER_API_PSK").filter(|s| !s.is_empty());

        let db_path = lookup("ROSTER_DB_PATH")
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
            .into();

        let catalog_path = lookup("ROSTER_CATALOG_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let bind_addr = parse_or(&lookup, "ROSTER_BIND_ADDR", || {
            SocketAddr::from(([127, 0, 0, 1], 8080))
        });

        let log_level =
            lookup("ROSTER_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let debounce_ms = parse_or(&lookup, "ROSTER_SETTINGS_DEBOUNCE_MS", || {
            DEFAULT_DEBOUNCE_MS
        });

        let idle_secs = parse_or(&lookup, "ROSTER_SESSION_IDLE_SECS", || {
            DEFAULT_SESSION_IDLE_SECS
        });

        // An empty prefix disables it.
        let phone_prefix = match lookup("ROSTER_PHONE_PREFIX") {
            Some(prefix) => Some(prefix.trim().to_string()).filter(|p| !p.is_empty()),
            None => Some(DEFAULT_PHONE_PREFIX.to_string()),
        };

        let offset_minutes = parse_or(&lookup, "ROSTER_UTC_OFFSET_MINUTES", || {
            DEFAULT_UTC_OFFSET_MINUTES
        });
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .or_else(|| {
                tracing::warn!(
                    "ROSTER_UTC_OFFSET_MINUTES={} is out of range, using {}",
                    offset_minutes,
                    DEFAULT_UTC_OFFSET_MINUTES
                );
                FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
            })
            .unwrap_or_else(|| Utc.fix());

        Self {
            api_psk,
            db_path,
            catalog_path,
            bind_addr,
            log_level,
            settings_debounce: Duration::from_millis(debounce_ms),
            session_idle: Duration::from_secs(idle_secs),
            phone_prefix,
            utc_offset,
        }
    }
}

/// Parse a variable, falling back to the default with a warning when malformed.
fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: impl FnOnce() -> T,
) -> T {
    match lookup(key) {
        None => default(),
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using the default", key, raw);
            default()
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config(&[]);

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(config.catalog_path.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.settings_debounce, Duration::from_millis(800));
        assert_eq!(config.session_idle, Duration::from_secs(1800));
        assert_eq!(config.phone_prefix.as_deref(), Some("+54"));
        assert_eq!(config.utc_offset.local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ROSTER_API_PSK", "secret"),
            ("ROSTER_CATALOG_PATH", "/etc/talks.json"),
            ("ROSTER_BIND_ADDR", "0.0.0.0:9000"),
            ("ROSTER_SETTINGS_DEBOUNCE_MS", "250"),
            ("ROSTER_SESSION_IDLE_SECS", "90"),
            ("ROSTER_PHONE_PREFIX", ""),
            ("ROSTER_UTC_OFFSET_MINUTES", "60"),
        ]);

        assert_eq!(config.api_psk.as_deref(), Some("secret"));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/etc/talks.json")));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.settings_debounce, Duration::from_millis(250));
        assert_eq!(config.session_idle, Duration::from_secs(90));
        assert!(config.phone_prefix.is_none());
        assert_eq!(config.utc_offset.local_minus_utc(), 3600);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = config(&[
            ("ROSTER_BIND_ADDR", "not-an-address"),
            ("ROSTER_SETTINGS_DEBOUNCE_MS", "soon"),
            ("ROSTER_UTC_OFFSET_MINUTES", "100000"),
        ]);

        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.settings_debounce, Duration::from_millis(800));
        assert_eq!(config.utc_offset.local_minus_utc(), -3 * 3600);
    }
}
