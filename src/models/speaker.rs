//! Speaker model and the request bodies that create or change one.

use serde::{Deserialize, Serialize};

use super::{default_true, TalkAssignment};

/// Congregation role a speaker can be registered with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SpeakerRole {
    #[serde(rename = "Anciano")]
    Anciano,
    #[serde(rename = "Siervo Ministerial")]
    SiervoMinisterial,
    #[serde(rename = "Publicador")]
    Publicador,
}

impl SpeakerRole {
    pub const ALL: [SpeakerRole; 3] = [
        SpeakerRole::Anciano,
        SpeakerRole::SiervoMinisterial,
        SpeakerRole::Publicador,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Anciano => "Anciano",
            SpeakerRole::SiervoMinisterial => "Siervo Ministerial",
            SpeakerRole::Publicador => "Publicador",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "Anciano" => Some(SpeakerRole::Anciano),
            "Siervo Ministerial" => Some(SpeakerRole::SiervoMinisterial),
            "Publicador" => Some(SpeakerRole::Publicador),
            _ => None,
        }
    }

    /// Plural heading used by the role banners in generated views.
    pub fn plural_label(&self) -> &'static str {
        match self {
            SpeakerRole::Anciano => "Ancianos",
            SpeakerRole::SiervoMinisterial => "Siervos Ministeriales",
            SpeakerRole::Publicador => "Publicadores",
        }
    }
}

/// A public speaker together with the talks they can give.
///
/// `role` is kept as free text: imported rosters may carry roles outside
/// [`SpeakerRole`], and the views group those alphabetically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Speaker {
    pub id: String,
    pub first_name: String,
    pub family_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: String,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default)]
    pub talks: Vec<TalkAssignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Speaker {
    pub fn talk(&self, talk_id: u32) -> Option<&TalkAssignment> {
        self.talks.iter().find(|t| t.id == talk_id)
    }

    pub fn has_talk(&self, talk_id: u32) -> bool {
        self.talk(talk_id).is_some()
    }

    pub fn available_talks(&self) -> impl Iterator<Item = &TalkAssignment> {
        self.talks.iter().filter(|t| t.available)
    }

    /// Whether the speaker shows up in shared views: available and offering
    /// at least one available talk.
    pub fn is_listed(&self) -> bool {
        self.available && self.talks.iter().any(|t| t.available)
    }

    /// "Family, First" as printed in every view.
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.family_name, self.first_name)
    }
}

/// Request body for registering a new speaker.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSpeaker {
    pub first_name: String,
    pub family_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// Defaults to the first registered role.
    #[serde(default)]
    pub role: Option<String>,
}

/// Merge-write of a speaker document. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeakerPatch {
    pub first_name: Option<String>,
    pub family_name: Option<String>,
    /// `Some("")` clears the stored phone.
    pub phone: Option<String>,
    pub role: Option<String>,
    pub available: Option<bool>,
    pub talks: Option<Vec<TalkAssignment>>,
}

impl SpeakerPatch {
    /// Apply the patch onto an existing speaker, stamping `updated_at`.
    pub fn apply_to(&self, speaker: &mut Speaker, updated_at: &str) {
        if let Some(first_name) = &self.first_name {
            speaker.first_name = first_name.clone();
        }
        if let Some(family_name) = &self.family_name {
            speaker.family_name = family_name.clone();
        }
        if let Some(phone) = &self.phone {
            speaker.phone = super::non_empty(phone);
        }
        if let Some(role) = &self.role {
            speaker.role = role.clone();
        }
        if let Some(available) = self.available {
            speaker.available = available;
        }
        if let Some(talks) = &self.talks {
            speaker.talks = talks.clone();
        }
        speaker.updated_at = Some(updated_at.to_string());
    }
}
