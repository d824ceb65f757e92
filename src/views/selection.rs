//! Speaker selection shared by every rendered view.
//!
//! Text and document output both render the groups produced here, so they
//! always agree on which (speaker, talk) pairs are listed.

use std::cmp::Ordering;

use crate::catalog::TalkCatalog;
use crate::models::{Speaker, SpeakerRole};

/// A role heading and the listed speakers under it.
#[derive(Debug, Clone)]
pub struct RoleGroup<'a> {
    pub role: &'a str,
    pub speakers: Vec<ListedSpeaker<'a>>,
}

impl RoleGroup<'_> {
    /// Banner text, e.g. "ANCIANOS".
    pub fn banner(&self) -> String {
        role_banner(self.role)
    }
}

/// A speaker together with the talks they currently offer.
#[derive(Debug, Clone)]
pub struct ListedSpeaker<'a> {
    pub speaker: &'a Speaker,
    pub talks: Vec<ListedTalk<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedTalk<'a> {
    pub id: u32,
    pub title: &'a str,
}

/// Group speakers by role, order groups and speakers, and keep only available
/// speakers with at least one available talk. Groups left empty are dropped.
pub fn select_listed<'a>(speakers: &'a [Speaker], catalog: &'a TalkCatalog) -> Vec<RoleGroup<'a>> {
    let mut roles: Vec<&str> = speakers.iter().map(|s| s.role.as_str()).collect();
    roles.sort_by(|a, b| compare_roles(a, b));
    roles.dedup();

    roles
        .into_iter()
        .filter_map(|role| {
            let mut members: Vec<&Speaker> = speakers.iter().filter(|s| s.role == role).collect();
            members.sort_by(|a, b| {
                compare_text(&a.family_name, &b.family_name)
                    .then_with(|| compare_text(&a.first_name, &b.first_name))
                    .then_with(|| a.id.cmp(&b.id))
            });

            let listed: Vec<ListedSpeaker<'a>> = members
                .into_iter()
                .filter(|s| s.is_listed())
                .map(|speaker| ListedSpeaker {
                    speaker,
                    talks: speaker
                        .available_talks()
                        .map(|t| ListedTalk {
                            id: t.id,
                            title: catalog.title_or_fallback(t.id),
                        })
                        .collect(),
                })
                .collect();

            if listed.is_empty() {
                None
            } else {
                Some(RoleGroup {
                    role,
                    speakers: listed,
                })
            }
        })
        .collect()
}

/// Flatten groups into (speaker id, talk id) pairs in render order.
#[cfg(test)]
pub fn listed_pairs(groups: &[RoleGroup<'_>]) -> Vec<(String, u32)> {
    groups
        .iter()
        .flat_map(|g| g.speakers.iter())
        .flat_map(|s| s.talks.iter().map(|t| (s.speaker.id.clone(), t.id)))
        .collect()
}

/// Elders first, ministerial servants second, every other role alphabetically.
pub fn compare_roles(a: &str, b: &str) -> Ordering {
    fn rank(role: &str) -> u8 {
        match SpeakerRole::from_label(role) {
            Some(SpeakerRole::Anciano) => 0,
            Some(SpeakerRole::SiervoMinisterial) => 1,
            _ => 2,
        }
    }

    rank(a)
        .cmp(&rank(b))
        .then_with(|| compare_text(a, b))
}

/// Spanish-aware comparison: case and accents only break ties, and "ñ"
/// sorts after "n".
pub fn compare_text(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}

fn collation_key(s: &str) -> String {
    let mut key = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' => key.push('a'),
            'é' | 'è' | 'ê' | 'ë' => key.push('e'),
            'í' | 'ì' | 'î' | 'ï' => key.push('i'),
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => key.push('o'),
            'ú' | 'ù' | 'û' | 'ü' => key.push('u'),
            'ç' => key.push('c'),
            'ñ' => key.push_str("n\u{10FFFF}"),
            other => key.push(other),
        }
    }
    key
}

/// Upper-case plural banner for a role.
pub fn role_banner(role: &str) -> String {
    match SpeakerRole::from_label(role) {
        Some(known) => known.plural_label().to_uppercase(),
        None => format!("{}S", role.to_uppercase()),
    }
}
