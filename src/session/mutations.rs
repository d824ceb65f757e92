//! Validated roster mutations.
//!
//! Each operation looks the speaker up in the live model at call time, writes
//! a merge patch through the repository and then waits for the model to catch
//! up with the committed revision. Failures are recorded as the session
//! notice before being returned.

use super::Session;
use crate::errors::AppError;
use crate::models::{non_empty, NewSpeaker, Speaker, SpeakerPatch, SpeakerRole, TalkAssignment};

impl Session {
    fn current_speaker(&self, id: &str) -> Result<Speaker, AppError> {
        self.ensure_open()?;
        self.model
            .borrow()
            .speaker(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Speaker {} not found", id)))
    }

    async fn patch_speaker(&self, id: &str, patch: SpeakerPatch) -> Result<Speaker, AppError> {
        let committed = self
            .repo
            .update_speaker(&self.identity, id, &patch)
            .await?;
        self.sync_to(committed.revision).await;
        Ok(committed.value)
    }

    /// Register a new speaker: available, with no talks.
    pub async fn add_speaker(&self, request: NewSpeaker) -> Result<Speaker, AppError> {
        let result = self.add_speaker_inner(request).await;
        self.notice(result)
    }

    async fn add_speaker_inner(&self, request: NewSpeaker) -> Result<Speaker, AppError> {
        self.ensure_open()?;
        let (Some(first_name), Some(family_name)) = (
            non_empty(&request.first_name),
            non_empty(&request.family_name),
        ) else {
            return Err(AppError::Validation(
                "First and family name are required".to_string(),
            ));
        };
        let role = match request.role.as_deref().map(str::trim) {
            None | Some("") => SpeakerRole::ALL[0],
            Some(label) => parse_role(label)?,
        };

        let request = NewSpeaker {
            first_name,
            family_name,
            phone: request.phone.as_deref().and_then(non_empty),
            role: Some(role.as_str().to_string()),
        };
        let committed = self.repo.add_speaker(&self.identity, &request).await?;
        self.sync_to(committed.revision).await;

        tracing::info!(identity = %self.identity, speaker = %committed.value.id, "Speaker added");
        Ok(committed.value)
    }

    /// Delete a speaker and its talks. Absent ids are a no-op.
    pub async fn remove_speaker(&self, id: &str) -> Result<bool, AppError> {
        let result = async {
            self.ensure_open()?;
            match self.repo.delete_speaker(&self.identity, id).await? {
                Some(revision) => {
                    self.sync_to(revision).await;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        .await;
        self.notice(result)
    }

    pub async fn toggle_speaker_availability(&self, id: &str) -> Result<Speaker, AppError> {
        let result = async {
            let speaker = self.current_speaker(id)?;
            let patch = SpeakerPatch {
                available: Some(!speaker.available),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await
        }
        .await;
        self.notice(result)
    }

    pub async fn change_role(&self, id: &str, role: &str) -> Result<Speaker, AppError> {
        let result = async {
            let role = parse_role(role.trim())?;
            self.current_speaker(id)?;
            let patch = SpeakerPatch {
                role: Some(role.as_str().to_string()),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await
        }
        .await;
        self.notice(result)
    }

    /// Set the phone number; blank input clears it.
    pub async fn update_phone(&self, id: &str, phone: &str) -> Result<Speaker, AppError> {
        let result = async {
            self.current_speaker(id)?;
            let patch = SpeakerPatch {
                phone: Some(phone.trim().to_string()),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await
        }
        .await;
        self.notice(result)
    }

    /// Assign a catalog talk, given as user input, to a speaker.
    pub async fn add_talk(&self, id: &str, talk: &str) -> Result<Speaker, AppError> {
        let result = async {
            let mut speaker = self.current_speaker(id)?;
            let talk_id = self.catalog.parse_talk_id(talk)?;
            if speaker.has_talk(talk_id) {
                return Err(AppError::DuplicateTalk(talk_id));
            }

            speaker.talks.push(TalkAssignment::new(talk_id));
            let patch = SpeakerPatch {
                talks: Some(speaker.talks),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await
        }
        .await;
        self.notice(result)
    }

    /// Remove a talk from a speaker. Returns `None` when it was not assigned.
    pub async fn remove_talk(&self, id: &str, talk_id: u32) -> Result<Option<Speaker>, AppError> {
        let result = async {
            let mut speaker = self.current_speaker(id)?;
            if !speaker.has_talk(talk_id) {
                return Ok(None);
            }

            speaker.talks.retain(|t| t.id != talk_id);
            let patch = SpeakerPatch {
                talks: Some(speaker.talks),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await.map(Some)
        }
        .await;
        self.notice(result)
    }

    /// Flip one talk's availability. Returns `None` when it was not assigned.
    pub async fn toggle_talk_availability(
        &self,
        id: &str,
        talk_id: u32,
    ) -> Result<Option<Speaker>, AppError> {
        let result = async {
            let mut speaker = self.current_speaker(id)?;
            let Some(talk) = speaker.talks.iter_mut().find(|t| t.id == talk_id) else {
                return Ok(None);
            };

            talk.available = !talk.available;
            let patch = SpeakerPatch {
                talks: Some(speaker.talks),
                ..Default::default()
            };
            self.patch_speaker(id, patch).await.map(Some)
        }
        .await;
        self.notice(result)
    }
}

fn parse_role(label: &str) -> Result<SpeakerRole, AppError> {
    SpeakerRole::from_label(label).ok_or_else(|| {
        let known: Vec<&str> = SpeakerRole::ALL.iter().map(|r| r.as_str()).collect();
        AppError::Validation(format!(
            "Unknown role '{}', expected one of: {}",
            label,
            known.join(", ")
        ))
    })
}
