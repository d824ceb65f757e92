//! Portable export file.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{MeetingDay, RosterSettings, Speaker};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Full, unfiltered roster plus configuration.
///
/// Unset configuration fields are written as `null` so that importing the file
/// clears them again.
#[derive(Debug, Clone, Serialize)]
pub struct ExportEnvelope {
    pub congregation_name: Option<String>,
    #[serde(rename = "addDateStamp")]
    pub add_date_stamp: bool,
    pub google_maps_url: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub meeting_day: MeetingDay,
    pub meeting_time: String,
    pub meeting_schedule: String,
    pub speakers: Vec<Speaker>,
    pub exported_at: String,
    pub version: String,
}

impl ExportEnvelope {
    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize export: {}", e)))
    }
}

pub fn build_export(
    speakers: &[Speaker],
    settings: &RosterSettings,
    exported_at: DateTime<Utc>,
) -> ExportEnvelope {
    ExportEnvelope {
        congregation_name: settings.congregation_name.clone(),
        add_date_stamp: settings.add_date_stamp,
        google_maps_url: settings.google_maps_url.clone(),
        contact_name: settings.contact_name.clone(),
        contact_phone: settings.contact_phone.clone(),
        meeting_day: settings.meeting_day,
        meeting_time: settings.meeting_time.clone(),
        meeting_schedule: settings.meeting_schedule(),
        speakers: speakers.to_vec(),
        exported_at: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        version: EXPORT_FORMAT_VERSION.to_string(),
    }
}

/// Download name, e.g. `conferenciantes-2024-03-09.json`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("conferenciantes-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TalkAssignment;
    use chrono::TimeZone;

    #[test]
    fn test_export_keeps_unavailable_entries() {
        let speaker = Speaker {
            id: "s1".to_string(),
            first_name: "Ana".to_string(),
            family_name: "Gómez".to_string(),
            phone: None,
            role: "Anciano".to_string(),
            available: false,
            talks: vec![TalkAssignment {
                id: 7,
                available: false,
                assigned_date: None,
            }],
            created_at: None,
            updated_at: None,
        };
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let export = build_export(&[speaker], &RosterSettings::default(), at);
        let json: serde_json::Value =
            serde_json::from_str(&export.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["version"], "1.0");
        assert_eq!(json["exported_at"], "2024-03-09T12:00:00.000Z");
        assert_eq!(json["addDateStamp"], false);
        assert_eq!(json["meeting_day"], "domingo");
        assert_eq!(json["meeting_schedule"], "Domingos - 10:00 hs");
        assert!(json["congregation_name"].is_null());
        assert_eq!(json["speakers"][0]["available"], false);
        assert_eq!(json["speakers"][0]["talks"][0]["id"], 7);
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_filename(date), "conferenciantes-2024-03-09.json");
    }
}
