//! Shareable plain-text roster, ready to paste into a messaging app.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use super::selection::select_listed;
use crate::catalog::TalkCatalog;
use crate::models::{RosterSettings, Speaker};

pub const EMPTY_ROSTER_TEXT: &str = "No hay conferenciantes registrados.";

/// Presentation knobs for the shareable text.
#[derive(Debug, Clone)]
pub struct TextOptions {
    /// Printed before every phone number, e.g. "+54".
    pub phone_prefix: Option<String>,
    /// Offset used to print the "Actualizado" stamp.
    pub utc_offset: FixedOffset,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            phone_prefix: None,
            utc_offset: Utc.fix(),
        }
    }
}

/// Render the roster as `=== LABEL ===` delimited plain text.
///
/// Identical inputs produce identical output; only the optional stamp line
/// depends on `generated_at`.
pub fn shareable_text(
    speakers: &[Speaker],
    settings: &RosterSettings,
    catalog: &TalkCatalog,
    options: &TextOptions,
    generated_at: DateTime<Utc>,
) -> String {
    if speakers.is_empty() {
        return EMPTY_ROSTER_TEXT.to_string();
    }

    let mut lines: Vec<String> = Vec::new();

    match &settings.congregation_name {
        Some(name) => lines.push(format!("=== Conferenciantes de {} ===", name.to_uppercase())),
        None => lines.push("=== Conferenciantes ===".to_string()),
    }
    lines.push(String::new());

    for group in select_listed(speakers, catalog) {
        lines.push(format!("=== {} ===", group.banner()));
        lines.push(String::new());

        for listed in &group.speakers {
            let speaker = listed.speaker;
            let phone = match (&speaker.phone, &options.phone_prefix) {
                (Some(phone), Some(prefix)) => format!(" ( {} {} )", prefix, phone),
                (Some(phone), None) => format!(" ( {} )", phone),
                (None, _) => String::new(),
            };
            lines.push(format!("{}{}:", speaker.display_name(), phone));

            for talk in &listed.talks {
                lines.push(format!("  {} - {}", talk.id, talk.title));
            }
            lines.push(String::new());
        }
    }

    if settings.contact_name.is_some() || settings.contact_phone.is_some() {
        lines.push("=== CONTACTO ===".to_string());
        if let Some(name) = &settings.contact_name {
            lines.push(name.clone());
        }
        if let Some(phone) = &settings.contact_phone {
            lines.push(format!("Tel: {}", phone));
        }
        lines.push(String::new());
    }

    lines.push("=== REUNIONES ===".to_string());
    lines.push(settings.meeting_schedule());
    lines.push(String::new());

    if let Some(url) = &settings.google_maps_url {
        lines.push("=== UBICACIÓN ===".to_string());
        lines.push(url.clone());
        lines.push(String::new());
    }

    if settings.add_date_stamp {
        let local = generated_at.with_timezone(&options.utc_offset);
        lines.push(format!("Actualizado: {}", local.format("%d/%m/%Y %H:%M")));
    }

    lines.join("\n").trim_end().to_string()
}
