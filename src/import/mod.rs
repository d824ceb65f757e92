//! Import of portable roster files.
//!
//! Importing is a destructive replace, so it happens in two steps:
//! [`ImportReconciler::prepare`] validates the whole payload into typed
//! values without touching the store, and [`PreparedImport::commit`] performs
//! the replace once the caller has confirmation.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::{non_empty, MeetingDay, SettingsPatch, Speaker, TalkAssignment};
use crate::session::Session;
use crate::views::export::EXPORT_FORMAT_VERSION;

/// A validated import payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportPayload {
    /// Bare speaker array without configuration.
    Legacy(Vec<Speaker>),
    /// Export envelope: speakers plus configuration fields.
    Envelope {
        speakers: Vec<Speaker>,
        settings: SettingsPatch,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub format: &'static str,
    pub speakers: usize,
    pub talks: usize,
    pub includes_settings: bool,
}

#[derive(Debug, Clone)]
pub struct PreparedImport {
    payload: ImportPayload,
}

pub struct ImportReconciler;

impl ImportReconciler {
    #[cfg(test)]
    pub fn prepare_str(json: &str) -> Result<PreparedImport, AppError> {
        let value: Value = serde_json::from_str(json)?;
        Self::prepare(&value)
    }

    /// Validate a payload. Any malformed record rejects the whole import.
    pub fn prepare(value: &Value) -> Result<PreparedImport, AppError> {
        let payload = match value {
            Value::Array(records) => ImportPayload::Legacy(parse_speakers(records)?),
            Value::Object(envelope) => {
                check_version(envelope)?;
                let records = envelope
                    .get("speakers")
                    .and_then(Value::as_array)
                    .ok_or_else(|| invalid("The envelope must contain a 'speakers' array"))?;
                ImportPayload::Envelope {
                    speakers: parse_speakers(records)?,
                    settings: parse_settings(envelope)?,
                }
            }
            _ => {
                return Err(invalid(
                    "Expected an array of speakers or an export envelope",
                ))
            }
        };

        Ok(PreparedImport { payload })
    }
}

/// Envelopes written before versioning carry no tag; a present tag must match.
fn check_version(envelope: &Map<String, Value>) -> Result<(), AppError> {
    match envelope.get("version") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(v)) if v == EXPORT_FORMAT_VERSION => Ok(()),
        Some(other) => Err(invalid(format!(
            "Unsupported export version {}, expected \"{}\"",
            other, EXPORT_FORMAT_VERSION
        ))),
    }
}

impl PreparedImport {
    #[cfg(test)]
    pub fn payload(&self) -> &ImportPayload {
        &self.payload
    }

    pub fn speakers(&self) -> &[Speaker] {
        match &self.payload {
            ImportPayload::Legacy(speakers) => speakers,
            ImportPayload::Envelope { speakers, .. } => speakers,
        }
    }

    pub fn settings(&self) -> Option<&SettingsPatch> {
        match &self.payload {
            ImportPayload::Legacy(_) => None,
            ImportPayload::Envelope { settings, .. } => Some(settings),
        }
    }

    pub fn summary(&self) -> ImportSummary {
        let speakers = self.speakers();
        ImportSummary {
            format: match self.payload {
                ImportPayload::Legacy(_) => "legacy",
                ImportPayload::Envelope { .. } => "envelope",
            },
            speakers: speakers.len(),
            talks: speakers.iter().map(|s| s.talks.len()).sum(),
            includes_settings: self.settings().is_some_and(|s| !s.is_empty()),
        }
    }

    /// Replace the session's roster with the imported one, then apply any
    /// configuration carried by the envelope.
    pub async fn commit(self, session: &Session) -> Result<ImportSummary, AppError> {
        let result = self.commit_inner(session).await;
        session.notice(result)
    }

    async fn commit_inner(self, session: &Session) -> Result<ImportSummary, AppError> {
        session.ensure_open()?;
        let summary = self.summary();

        // A scheduled settings write must not land on top of the imported values.
        session.flush_settings().await?;

        let now = Utc::now().to_rfc3339();
        let (speakers, settings) = match self.payload {
            ImportPayload::Legacy(speakers) => (speakers, None),
            ImportPayload::Envelope { speakers, settings } => (speakers, Some(settings)),
        };
        let speakers: Vec<Speaker> = speakers
            .into_iter()
            .map(|mut speaker| {
                if speaker.created_at.is_none() {
                    speaker.created_at = Some(now.clone());
                }
                speaker.updated_at = Some(now.clone());
                speaker
            })
            .collect();

        let revision = session
            .repo()
            .replace_roster(session.identity(), &speakers)
            .await?;
        session.sync_to(revision).await;

        if let Some(settings) = settings.filter(|s| !s.is_empty()) {
            session.store_settings(&settings).await?;
        }

        tracing::info!(
            identity = %session.identity(),
            speakers = summary.speakers,
            format = summary.format,
            "Roster imported"
        );
        Ok(summary)
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidImportFormat(message.into())
}

fn parse_speakers(records: &[Value]) -> Result<Vec<Speaker>, AppError> {
    let mut seen = HashSet::new();
    let mut speakers = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let speaker = parse_speaker(record)
            .map_err(|reason| invalid(format!("Speaker #{}: {}", index + 1, reason)))?;
        if !seen.insert(speaker.id.clone()) {
            return Err(invalid(format!("Duplicate speaker id '{}'", speaker.id)));
        }
        speakers.push(speaker);
    }

    Ok(speakers)
}

fn parse_speaker(record: &Value) -> Result<Speaker, String> {
    let object = record.as_object().ok_or("expected an object")?;

    let talks = object
        .get("talks")
        .and_then(Value::as_array)
        .ok_or("'talks' must be an array")?;
    let mut assignments: Vec<TalkAssignment> = Vec::with_capacity(talks.len());
    for talk in talks {
        let assignment = parse_talk(talk)?;
        if !assignments.iter().any(|t| t.id == assignment.id) {
            assignments.push(assignment);
        }
    }

    Ok(Speaker {
        id: required_text(object, "id")?,
        first_name: required_text(object, "first_name")?,
        family_name: required_text(object, "family_name")?,
        phone: optional_text(object, "phone")?,
        role: required_text(object, "role")?,
        available: optional_bool(object, "available")?.unwrap_or(true),
        talks: assignments,
        created_at: optional_text(object, "created_at")?,
        updated_at: None,
    })
}

fn parse_talk(value: &Value) -> Result<TalkAssignment, String> {
    let object = value.as_object().ok_or("talk entries must be objects")?;
    let id = object
        .get("id")
        .and_then(Value::as_u64)
        .filter(|id| *id > 0)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or("talk ids must be positive integers")?;

    Ok(TalkAssignment {
        id,
        available: optional_bool(object, "available")?.unwrap_or(true),
        assigned_date: optional_text(object, "assigned_date")?,
    })
}

fn required_text(object: &Map<String, Value>, key: &str) -> Result<String, String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .and_then(non_empty)
        .ok_or_else(|| format!("'{}' must be a non-empty string", key))
}

/// Absent, null and blank all read as `None`.
fn optional_text(object: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(non_empty(s)),
        Some(_) => Err(format!("'{}' must be a string", key)),
    }
}

fn optional_bool(object: &Map<String, Value>, key: &str) -> Result<Option<bool>, String> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(format!("'{}' must be a boolean", key)),
    }
}

/// Configuration fields of an envelope. A present `null` clears the field,
/// an absent key leaves it untouched.
fn parse_settings(envelope: &Map<String, Value>) -> Result<SettingsPatch, AppError> {
    let clearable = |key: &str| -> Result<Option<String>, AppError> {
        match envelope.get(key) {
            None => Ok(None),
            Some(Value::Null) => Ok(Some(String::new())),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(format!("'{}' must be a string", key))),
        }
    };

    let meeting_day = match envelope.get("meeting_day") {
        None | Some(Value::Null) => None,
        Some(Value::String(day)) => Some(
            MeetingDay::from_label(day)
                .ok_or_else(|| invalid(format!("Unknown meeting day '{}'", day)))?,
        ),
        Some(_) => return Err(invalid("'meeting_day' must be a string")),
    };

    let meeting_time = match envelope.get("meeting_time") {
        None | Some(Value::Null) => None,
        Some(Value::String(time)) => Some(time.clone()),
        Some(_) => return Err(invalid("'meeting_time' must be a string")),
    };

    let add_date_stamp = match envelope.get("addDateStamp") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(flag)) => Some(*flag),
        Some(_) => return Err(invalid("'addDateStamp' must be a boolean")),
    };

    let patch = SettingsPatch {
        congregation_name: clearable("congregation_name")?,
        contact_name: clearable("contact_name")?,
        contact_phone: clearable("contact_phone")?,
        meeting_day,
        meeting_time,
        add_date_stamp,
        google_maps_url: clearable("google_maps_url")?,
    };
    patch
        .validate()
        .map_err(|e| AppError::InvalidImportFormat(e.message()))?;

    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RosterSettings;
    use crate::session::{SessionOptions, SessionManager};
    use crate::views::build_export;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn sessions() -> (TempDir, SessionManager) {
        let temp_dir = TempDir::new().unwrap();
        let pool = crate::db::init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let manager = SessionManager::new(
            crate::db::Repository::new(pool),
            Arc::new(crate::catalog::TalkCatalog::bundled().unwrap()),
            SessionOptions::default(),
        );
        (temp_dir, manager)
    }

    #[test]
    fn test_legacy_array_defaults() {
        let prepared = ImportReconciler::prepare(&json!([{
            "id": "s1",
            "first_name": "Ana",
            "family_name": "Gómez",
            "role": "Anciano",
            "phone": "",
            "talks": [{"id": 12}, {"id": 7, "available": false, "assigned_date": ""}, {"id": 12}]
        }]))
        .unwrap();

        assert!(matches!(prepared.payload(), ImportPayload::Legacy(_)));
        let speaker = &prepared.speakers()[0];
        assert!(speaker.available);
        assert!(speaker.phone.is_none());
        assert_eq!(
            speaker.talks,
            vec![
                TalkAssignment::new(12),
                TalkAssignment {
                    id: 7,
                    available: false,
                    assigned_date: None
                }
            ]
        );
        assert_eq!(
            prepared.summary(),
            ImportSummary {
                format: "legacy",
                speakers: 1,
                talks: 2,
                includes_settings: false,
            }
        );
    }

    #[test]
    fn test_envelope_settings() {
        let prepared = ImportReconciler::prepare(&json!({
            "congregation_name": "Villa Norte",
            "addDateStamp": true,
            "google_maps_url": null,
            "meeting_day": "sabado",
            "meeting_time": "18:30",
            "speakers": []
        }))
        .unwrap();

        let settings = prepared.settings().unwrap();
        assert_eq!(settings.congregation_name.as_deref(), Some("Villa Norte"));
        assert_eq!(settings.google_maps_url.as_deref(), Some(""));
        assert_eq!(settings.contact_name, None);
        assert_eq!(settings.meeting_day, Some(MeetingDay::Sabado));
        assert_eq!(settings.add_date_stamp, Some(true));
        assert!(prepared.summary().includes_settings);
    }

    #[test]
    fn test_malformed_payloads_are_rejected() {
        let cases = vec![
            json!("roster"),
            json!({"congregation_name": "x"}),
            json!({"speakers": {}}),
            json!([{"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano"}]),
            json!([{"id": "", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": []}]),
            json!([{"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": [{"id": "12"}]}]),
            json!([{"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": [{"id": 0}]}]),
            json!([{"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": [], "available": "yes"}]),
            json!([
                {"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": []},
                {"id": "s1", "first_name": "C", "family_name": "D", "role": "Anciano", "talks": []}
            ]),
            json!({"meeting_time": "7pm", "speakers": []}),
            json!({"meeting_day": "lunes", "speakers": []}),
            json!({"version": "9.9", "speakers": []}),
            json!({"version": 42, "speakers": []}),
        ];

        for case in cases {
            let result = ImportReconciler::prepare(&case);
            assert!(
                matches!(result, Err(AppError::InvalidImportFormat(_))),
                "accepted {}",
                case
            );
        }
        assert!(ImportReconciler::prepare(&json!({"version": "1.0", "speakers": []})).is_ok());
        assert!(matches!(
            ImportReconciler::prepare_str("{not json"),
            Err(AppError::InvalidImportFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_import_then_export_keeps_ids() {
        let (_dir, manager) = sessions().await;
        let session = manager.get_or_open("user-1").await.unwrap();
        session
            .add_speaker(crate::models::NewSpeaker {
                first_name: "Old".to_string(),
                family_name: "Speaker".to_string(),
                phone: None,
                role: None,
            })
            .await
            .unwrap();

        let prepared = ImportReconciler::prepare(&json!({
            "speakers": [{"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": []}]
        }))
        .unwrap();
        prepared.commit(&session).await.unwrap();

        let model = session.current();
        let export = build_export(&model.speakers, &model.settings, Utc::now());
        let ids: Vec<&str> = export.speakers.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1"]);
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let (_dir, manager) = sessions().await;
        let source = manager.get_or_open("source").await.unwrap();

        let ana = source
            .add_speaker(crate::models::NewSpeaker {
                first_name: "Ana".to_string(),
                family_name: "Gómez".to_string(),
                phone: Some("11 1234-5678".to_string()),
                role: Some("Anciano".to_string()),
            })
            .await
            .unwrap();
        source.add_talk(&ana.id, "12").await.unwrap();
        source.add_talk(&ana.id, "7").await.unwrap();
        source.toggle_talk_availability(&ana.id, 7).await.unwrap();
        let luis = source
            .add_speaker(crate::models::NewSpeaker {
                first_name: "Luis".to_string(),
                family_name: "Pérez".to_string(),
                phone: None,
                role: Some("Publicador".to_string()),
            })
            .await
            .unwrap();
        source.toggle_speaker_availability(&luis.id).await.unwrap();
        source
            .edit_settings(SettingsPatch {
                congregation_name: Some("Villa Norte".to_string()),
                meeting_day: Some(MeetingDay::Sabado),
                meeting_time: Some("18:30".to_string()),
                add_date_stamp: Some(true),
                ..Default::default()
            })
            .unwrap();

        let before = source.current();
        let file = build_export(&before.speakers, &before.settings, Utc::now())
            .to_json_pretty()
            .unwrap();

        let target = manager.get_or_open("target").await.unwrap();
        target
            .edit_settings(SettingsPatch {
                contact_name: Some("Someone".to_string()),
                ..Default::default()
            })
            .unwrap();
        ImportReconciler::prepare_str(&file)
            .unwrap()
            .commit(&target)
            .await
            .unwrap();
        let after = target.current();

        let strip = |speakers: &[Speaker]| -> Vec<Speaker> {
            speakers
                .iter()
                .cloned()
                .map(|mut s| {
                    s.created_at = None;
                    s.updated_at = None;
                    s
                })
                .collect()
        };
        assert_eq!(strip(&after.speakers), strip(&before.speakers));

        let comparable = |s: &RosterSettings| RosterSettings {
            updated_at: None,
            version: 0,
            ..s.clone()
        };
        assert_eq!(comparable(&after.settings), comparable(&before.settings));
        manager.close_all().await;
    }

    #[tokio::test]
    async fn test_rejected_import_leaves_roster_untouched() {
        let (_dir, manager) = sessions().await;
        let session = manager.get_or_open("user-1").await.unwrap();
        session
            .add_speaker(crate::models::NewSpeaker {
                first_name: "Ana".to_string(),
                family_name: "Gómez".to_string(),
                phone: None,
                role: None,
            })
            .await
            .unwrap();

        let result = ImportReconciler::prepare(&json!([
            {"id": "s1", "first_name": "A", "family_name": "B", "role": "Anciano", "talks": []},
            {"id": "s2", "first_name": "C", "role": "Anciano", "talks": []}
        ]));
        assert!(result.is_err());
        assert_eq!(session.current().speakers.len(), 1);
        manager.close_all().await;
    }
}
