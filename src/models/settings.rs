//! Per-identity roster configuration.

use serde::{Deserialize, Serialize};

use super::non_empty;
use crate::errors::AppError;

/// Weekend day the congregation holds its public meeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MeetingDay {
    Sabado,
    #[default]
    Domingo,
}

impl MeetingDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingDay::Sabado => "sabado",
            MeetingDay::Domingo => "domingo",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s {
            "sabado" => Some(MeetingDay::Sabado),
            "domingo" => Some(MeetingDay::Domingo),
            _ => None,
        }
    }

    pub fn plural_label(&self) -> &'static str {
        match self {
            MeetingDay::Sabado => "Sábados",
            MeetingDay::Domingo => "Domingos",
        }
    }
}

pub const DEFAULT_MEETING_TIME: &str = "10:00";

/// Congregation details printed around the roster in every view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congregation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub meeting_day: MeetingDay,
    #[serde(default = "default_meeting_time")]
    pub meeting_time: String,
    #[serde(default)]
    pub add_date_stamp: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Number of writes the stored settings document has received
    #[serde(default)]
    pub version: i64,
}

fn default_meeting_time() -> String {
    DEFAULT_MEETING_TIME.to_string()
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            congregation_name: None,
            contact_name: None,
            contact_phone: None,
            meeting_day: MeetingDay::default(),
            meeting_time: default_meeting_time(),
            add_date_stamp: false,
            google_maps_url: None,
            updated_at: None,
            version: 0,
        }
    }
}

impl RosterSettings {
    /// Human readable meeting schedule, e.g. "Sábados - 18:30 hs".
    pub fn meeting_schedule(&self) -> String {
        format!(
            "{} - {} hs",
            self.meeting_day.plural_label(),
            self.meeting_time
        )
    }

    /// Merge a partial update into these settings.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(v) = &patch.congregation_name {
            self.congregation_name = non_empty(v);
        }
        if let Some(v) = &patch.contact_name {
            self.contact_name = non_empty(v);
        }
        if let Some(v) = &patch.contact_phone {
            self.contact_phone = non_empty(v);
        }
        if let Some(day) = patch.meeting_day {
            self.meeting_day = day;
        }
        if let Some(time) = &patch.meeting_time {
            self.meeting_time = time.trim().to_string();
        }
        if let Some(flag) = patch.add_date_stamp {
            self.add_date_stamp = flag;
        }
        if let Some(v) = &patch.google_maps_url {
            self.google_maps_url = non_empty(v);
        }
    }
}

/// Partial settings update. Blank strings clear the corresponding field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congregation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_day: Option<MeetingDay>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_date_stamp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_maps_url: Option<String>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(time) = &self.meeting_time {
            if !is_valid_meeting_time(time.trim()) {
                return Err(AppError::Validation(format!(
                    "Meeting time must use HH:MM, got '{}'",
                    time
                )));
            }
        }
        Ok(())
    }

    /// Fold a later edit into this one; fields set by `later` win.
    pub fn merge(&mut self, later: SettingsPatch) {
        if later.congregation_name.is_some() {
            self.congregation_name = later.congregation_name;
        }
        if later.contact_name.is_some() {
            self.contact_name = later.contact_name;
        }
        if later.contact_phone.is_some() {
            self.contact_phone = later.contact_phone;
        }
        if later.meeting_day.is_some() {
            self.meeting_day = later.meeting_day;
        }
        if later.meeting_time.is_some() {
            self.meeting_time = later.meeting_time;
        }
        if later.add_date_stamp.is_some() {
            self.add_date_stamp = later.add_date_stamp;
        }
        if later.google_maps_url.is_some() {
            self.google_maps_url = later.google_maps_url;
        }
    }
}

fn is_valid_meeting_time(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return false;
    }
    match (hours.parse::<u8>(), minutes.parse::<u8>()) {
        (Ok(h), Ok(m)) => h < 24 && m < 60,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meeting_schedule() {
        let mut settings = RosterSettings::default();
        settings.meeting_day = MeetingDay::Sabado;
        settings.meeting_time = "18:30".to_string();
        assert_eq!(settings.meeting_schedule(), "Sábados - 18:30 hs");
    }

    #[test]
    fn test_meeting_time_validation() {
        assert!(is_valid_meeting_time("00:00"));
        assert!(is_valid_meeting_time("23:59"));
        assert!(!is_valid_meeting_time("24:00"));
        assert!(!is_valid_meeting_time("9:30"));
        assert!(!is_valid_meeting_time("09-30"));
        assert!(!is_valid_meeting_time("ab:cd"));
    }

    #[test]
    fn test_merge_later_wins_and_keeps_untouched() {
        let mut first = SettingsPatch {
            congregation_name: Some("Norte".to_string()),
            contact_name: Some("Luis".to_string()),
            ..Default::default()
        };
        first.merge(SettingsPatch {
            congregation_name: Some("Sur".to_string()),
            ..Default::default()
        });
        assert_eq!(first.congregation_name.as_deref(), Some("Sur"));
        assert_eq!(first.contact_name.as_deref(), Some("Luis"));
    }

    #[test]
    fn test_apply_blank_clears_field() {
        let mut settings = RosterSettings {
            google_maps_url: Some("https://maps.example/x".to_string()),
            ..Default::default()
        };
        settings.apply(&SettingsPatch {
            google_maps_url: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(settings.google_maps_url, None);
    }

    #[test]
    fn test_meeting_day_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(MeetingDay::Sabado).unwrap(),
            serde_json::json!("sabado")
        );
    }
}
