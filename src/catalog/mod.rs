//! Talk catalog: the static list of numbered public talks.
//!
//! Loaded once at startup and shared read-only by every session and view.

use std::collections::BTreeMap;
use std::path::Path;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Talk;

/// Title printed when an assigned talk number is missing from the catalog.
pub const TITLE_NOT_FOUND: &str = "Título no encontrado";

const BUNDLED_CATALOG: &str = include_str!("../../data/talks.json");

/// Immutable lookup of talk titles by number.
#[derive(Debug, Clone, Default)]
pub struct TalkCatalog {
    talks: BTreeMap<u32, String>,
}

impl TalkCatalog {
    /// Build a catalog, rejecting zero or duplicate talk numbers.
    pub fn from_talks(talks: Vec<Talk>) -> Result<Self, AppError> {
        let mut map = BTreeMap::new();
        for talk in talks {
            if talk.id == 0 {
                return Err(AppError::Validation(
                    "Talk numbers must be positive".to_string(),
                ));
            }
            if map.insert(talk.id, talk.title).is_some() {
                return Err(AppError::Validation(format!(
                    "Duplicate talk number {} in catalog",
                    talk.id
                )));
            }
        }
        Ok(Self { talks: map })
    }

    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let talks: Vec<Talk> = serde_json::from_str(json)
            .map_err(|e| AppError::Internal(format!("Invalid talk catalog: {}", e)))?;
        Self::from_talks(talks)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!(
                "Failed to read talk catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// The catalog shipped with the binary.
    pub fn bundled() -> Result<Self, AppError> {
        Self::from_json_str(BUNDLED_CATALOG)
    }

    pub fn len(&self) -> usize {
        self.talks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.talks.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.talks.contains_key(&id)
    }

    pub fn title(&self, id: u32) -> Option<&str> {
        self.talks.get(&id).map(String::as_str)
    }

    pub fn title_or_fallback(&self, id: u32) -> &str {
        self.title(id).unwrap_or(TITLE_NOT_FOUND)
    }

    pub fn get(&self, id: u32) -> Option<Talk> {
        self.title(id).map(|title| Talk {
            id,
            title: title.to_string(),
        })
    }

    /// All talks ordered by number.
    pub fn all(&self) -> Vec<Talk> {
        self.talks
            .iter()
            .map(|(id, title)| Talk {
                id: *id,
                title: title.clone(),
            })
            .collect()
    }

    /// Parse user input into a talk number that exists in the catalog.
    pub fn parse_talk_id(&self, raw: &str) -> Result<u32, AppError> {
        let trimmed = raw.trim();
        match trimmed.parse::<u32>() {
            Ok(id) if self.contains(id) => Ok(id),
            _ => Err(AppError::InvalidTalkId(trimmed.to_string())),
        }
    }
}

/// Load the catalog from the store, seeding the store first when it is empty.
pub async fn load_or_seed(
    repo: &Repository,
    seed_path: Option<&Path>,
) -> Result<TalkCatalog, AppError> {
    let stored = repo.list_catalog().await?;
    if !stored.is_empty() {
        tracing::info!("Loaded {} talks from the store", stored.len());
        return TalkCatalog::from_talks(stored);
    }

    let seed = match seed_path {
        Some(path) => TalkCatalog::from_json_file(path)?,
        None => TalkCatalog::bundled()?,
    };
    let saved = repo.save_catalog(&seed.all()).await?;
    tracing::info!("Seeded talk catalog with {} talks", saved);

    Ok(seed)
}
