//! Paginated document layout.
//!
//! Produces a fixed A4 template as positioned text elements. Rendering the
//! layout to a concrete file format is left to the consumer.

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::Serialize;

use super::selection::select_listed;
use crate::catalog::TalkCatalog;
use crate::models::{RosterSettings, Speaker};

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
pub const MARGIN: f32 = 40.0;
pub const DOCUMENT_TITLE: &str = "Arreglos de Conferencias";

const TITLE_SIZE: f32 = 24.0;
const BANNER_SIZE: f32 = 14.0;
const SPEAKER_SIZE: f32 = 12.0;
const TALK_SIZE: f32 = 11.0;
const INFO_SIZE: f32 = 12.0;
const PAGE_NUMBER_SIZE: f32 = 9.0;

const LINE_SPACING: f32 = 1.4;
const TALK_INDENT: f32 = 20.0;
const BLOCK_GAP: f32 = 8.0;
const SECTION_GAP: f32 = 20.0;

/// Space kept free above the bottom margin for the page number.
const PAGE_NUMBER_RESERVE: f32 = 20.0;
const CONTENT_BOTTOM: f32 = PAGE_HEIGHT - MARGIN - PAGE_NUMBER_RESERVE;
const USABLE_HEIGHT: f32 = CONTENT_BOTTOM - MARGIN;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Title,
    Banner,
    Speaker,
    Talk,
    Info,
    PageNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
}

/// One line of text placed on a page. `y` grows downwards from the top edge.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub kind: ElementKind,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub align: Align,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talk_id: Option<u32>,
}

impl Element {
    fn new(kind: ElementKind, text: impl Into<String>, font_size: f32) -> Self {
        let (x, align) = match kind {
            ElementKind::Title | ElementKind::Banner | ElementKind::PageNumber => {
                (PAGE_WIDTH / 2.0, Align::Center)
            }
            ElementKind::Talk => (MARGIN + TALK_INDENT, Align::Left),
            ElementKind::Speaker | ElementKind::Info => (MARGIN, Align::Left),
        };
        Self {
            kind,
            text: text.into(),
            x,
            y: 0.0,
            font_size,
            align,
            speaker_id: None,
            talk_id: None,
        }
    }

    fn for_speaker(mut self, speaker_id: &str) -> Self {
        self.speaker_id = Some(speaker_id.to_string());
        self
    }

    fn for_talk(mut self, talk_id: u32) -> Self {
        self.talk_id = Some(talk_id);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub number: usize,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLayout {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub pages: Vec<Page>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every element in reading order.
    #[cfg(test)]
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.pages.iter().flat_map(|p| p.elements.iter())
    }

    /// (speaker id, talk id) pairs in render order.
    #[cfg(test)]
    pub fn listed_pairs(&self) -> Vec<(String, u32)> {
        self.elements()
            .filter(|e| e.kind == ElementKind::Talk)
            .filter_map(|e| Some((e.speaker_id.clone()?, e.talk_id?)))
            .collect()
    }

    /// Text-only rendering, one element per line, pages separated by a form feed.
    pub fn to_plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| {
                page.elements
                    .iter()
                    .map(|e| match e.kind {
                        ElementKind::Talk => format!("    {}", e.text),
                        _ => e.text.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\u{c}\n")
    }
}

fn line_height(font_size: f32) -> f32 {
    font_size * LINE_SPACING
}

struct Paginator {
    pages: Vec<Page>,
    cursor: f32,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: vec![Page {
                number: 1,
                elements: Vec::new(),
            }],
            cursor: MARGIN,
        }
    }

    fn remaining(&self) -> f32 {
        CONTENT_BOTTOM - self.cursor
    }

    fn at_top(&self) -> bool {
        self.cursor <= MARGIN
    }

    fn break_page(&mut self) {
        let number = self.pages.len() + 1;
        self.pages.push(Page {
            number,
            elements: Vec::new(),
        });
        self.cursor = MARGIN;
    }

    /// Start a new page unless `height` still fits on the current one.
    fn keep_together(&mut self, height: f32) {
        if height > self.remaining() && !self.at_top() {
            self.break_page();
        }
    }

    fn place(&mut self, mut element: Element) {
        let advance = line_height(element.font_size);
        self.keep_together(advance);
        element.y = self.cursor;
        self.cursor += advance;
        if let Some(page) = self.pages.last_mut() {
            page.elements.push(element);
        }
    }

    fn gap(&mut self, height: f32) {
        self.cursor = (self.cursor + height).min(CONTENT_BOTTOM);
    }

    fn finish(mut self) -> Vec<Page> {
        let total = self.pages.len();
        for page in &mut self.pages {
            let mut footer = Element::new(
                ElementKind::PageNumber,
                format!("Página {} de {}", page.number, total),
                PAGE_NUMBER_SIZE,
            );
            footer.y = PAGE_HEIGHT - MARGIN;
            page.elements.push(footer);
        }
        self.pages
    }
}

fn speaker_block_height(talks: usize) -> f32 {
    line_height(SPEAKER_SIZE) + talks as f32 * line_height(TALK_SIZE) + BLOCK_GAP
}

fn long_date(at: DateTime<FixedOffset>) -> String {
    let month = MONTHS[at.month0() as usize];
    format!("{} de {} de {}", at.day(), month, at.year())
}

fn info_lines(settings: &RosterSettings, updated: &str) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Congregación: {}",
            settings
                .congregation_name
                .as_deref()
                .unwrap_or("No especificada")
        ),
        format!("Reuniones: {}", settings.meeting_schedule()),
    ];
    if let Some(url) = &settings.google_maps_url {
        lines.push(format!("Ubicación: {}", url));
    }
    lines.push(format!("Actualizado: {}", updated));
    if let Some(name) = &settings.contact_name {
        lines.push(format!("Contacto: {}", name));
    }
    if let Some(phone) = &settings.contact_phone {
        lines.push(format!("Teléfono: {}", phone));
    }
    lines
}

/// Lay the listed roster out on A4 pages.
///
/// Speaker blocks are never split when they fit on a single page, and a role
/// banner always shares its page with the first speaker under it.
pub fn render_document(
    speakers: &[Speaker],
    settings: &RosterSettings,
    catalog: &TalkCatalog,
    utc_offset: FixedOffset,
    generated_at: DateTime<Utc>,
) -> DocumentLayout {
    let mut paginator = Paginator::new();

    paginator.place(Element::new(ElementKind::Title, DOCUMENT_TITLE, TITLE_SIZE));
    paginator.gap(SECTION_GAP);

    for group in select_listed(speakers, catalog) {
        let banner_height = line_height(BANNER_SIZE) + BLOCK_GAP;
        let first_block = group
            .speakers
            .first()
            .map(|s| speaker_block_height(s.talks.len()))
            .unwrap_or_default();
        paginator.keep_together((banner_height + first_block).min(USABLE_HEIGHT));
        paginator.place(Element::new(ElementKind::Banner, group.banner(), BANNER_SIZE));
        paginator.gap(BLOCK_GAP);

        for listed in &group.speakers {
            let speaker = listed.speaker;
            let block = speaker_block_height(listed.talks.len());
            if block <= USABLE_HEIGHT {
                paginator.keep_together(block);
            }

            let heading = match &speaker.phone {
                Some(phone) => format!("{} - Tel: {}", speaker.display_name(), phone),
                None => speaker.display_name(),
            };
            paginator.place(
                Element::new(ElementKind::Speaker, heading, SPEAKER_SIZE).for_speaker(&speaker.id),
            );
            for talk in &listed.talks {
                paginator.place(
                    Element::new(
                        ElementKind::Talk,
                        format!("{} - {}", talk.id, talk.title),
                        TALK_SIZE,
                    )
                    .for_speaker(&speaker.id)
                    .for_talk(talk.id),
                );
            }
            paginator.gap(BLOCK_GAP);
        }
    }

    let updated = long_date(generated_at.with_timezone(&utc_offset));
    let info = info_lines(settings, &updated);
    paginator.gap(SECTION_GAP);
    paginator.keep_together(info.len() as f32 * line_height(INFO_SIZE));
    for line in info {
        paginator.place(Element::new(ElementKind::Info, line, INFO_SIZE));
    }

    DocumentLayout {
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        margin: MARGIN,
        pages: paginator.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MeetingDay, Talk, TalkAssignment};
    use chrono::{Offset, TimeZone};

    fn catalog() -> TalkCatalog {
        TalkCatalog::from_talks(
            (1..=30)
                .map(|id| Talk {
                    id,
                    title: format!("Discurso {}", id),
                })
                .collect(),
        )
        .unwrap()
    }

    fn speaker(id: usize, role: &str, talks: u32) -> Speaker {
        Speaker {
            id: format!("s{:03}", id),
            first_name: "Juan".to_string(),
            family_name: format!("Apellido{:03}", id),
            phone: None,
            role: role.to_string(),
            available: true,
            talks: (1..=talks).map(TalkAssignment::new).collect(),
            created_at: None,
            updated_at: None,
        }
    }

    fn render(speakers: &[Speaker], settings: &RosterSettings) -> DocumentLayout {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        render_document(speakers, settings, &catalog(), Utc.fix(), at)
    }

    #[test]
    fn test_single_page_layout() {
        let settings = RosterSettings {
            congregation_name: Some("Villa Norte".to_string()),
            meeting_day: MeetingDay::Sabado,
            meeting_time: "18:30".to_string(),
            contact_phone: Some("11 5555-0000".to_string()),
            ..Default::default()
        };
        let doc = render(&[speaker(1, "Anciano", 2)], &settings);

        assert_eq!(doc.page_count(), 1);
        let texts: Vec<&str> = doc.elements().map(|e| e.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Arreglos de Conferencias",
                "ANCIANOS",
                "Apellido001, Juan",
                "1 - Discurso 1",
                "2 - Discurso 2",
                "Congregación: Villa Norte",
                "Reuniones: Sábados - 18:30 hs",
                "Actualizado: 9 de marzo de 2024",
                "Teléfono: 11 5555-0000",
                "Página 1 de 1",
            ]
        );
    }

    #[test]
    fn test_speaker_blocks_are_not_split() {
        let speakers: Vec<Speaker> = (0..40).map(|i| speaker(i, "Anciano", 5)).collect();
        let doc = render(&speakers, &RosterSettings::default());
        assert!(doc.page_count() > 1);

        for page in &doc.pages {
            for element in page.elements.iter().filter(|e| e.kind == ElementKind::Talk) {
                let heading_on_page = page.elements.iter().any(|e| {
                    e.kind == ElementKind::Speaker && e.speaker_id == element.speaker_id
                });
                assert!(heading_on_page, "talk separated from its speaker");
                assert!(element.y + line_height(TALK_SIZE) <= CONTENT_BOTTOM);
            }
        }
    }

    #[test]
    fn test_page_numbers_and_info_on_last_page() {
        let speakers: Vec<Speaker> = (0..40).map(|i| speaker(i, "Anciano", 5)).collect();
        let doc = render(&speakers, &RosterSettings::default());
        let total = doc.page_count();

        for page in &doc.pages {
            let footer = page.elements.last().unwrap();
            assert_eq!(footer.kind, ElementKind::PageNumber);
            assert_eq!(footer.text, format!("Página {} de {}", page.number, total));
        }
        let info_pages: Vec<usize> = doc
            .pages
            .iter()
            .filter(|p| p.elements.iter().any(|e| e.kind == ElementKind::Info))
            .map(|p| p.number)
            .collect();
        assert_eq!(info_pages, vec![total]);
    }

    #[test]
    fn test_banner_stays_with_first_speaker() {
        let mut speakers: Vec<Speaker> = (0..24).map(|i| speaker(i, "Anciano", 5)).collect();
        speakers.extend((100..104).map(|i| speaker(i, "Siervo Ministerial", 3)));
        let doc = render(&speakers, &RosterSettings::default());

        for page in &doc.pages {
            if let Some(pos) = page
                .elements
                .iter()
                .position(|e| e.kind == ElementKind::Banner)
            {
                assert_eq!(page.elements[pos + 1].kind, ElementKind::Speaker);
            }
        }
    }

    #[test]
    fn test_oversized_speaker_flows_across_pages() {
        let big = speaker(1, "Anciano", 60);
        let doc = render(&[big], &RosterSettings::default());
        assert_eq!(doc.listed_pairs().len(), 60);
        assert!(doc.page_count() >= 2);
    }

    #[test]
    fn test_empty_roster_still_has_info() {
        let doc = render(&[], &RosterSettings::default());
        assert_eq!(doc.page_count(), 1);
        assert!(doc.to_plain_text().contains("Congregación: No especificada"));
        assert!(doc.to_plain_text().contains("Reuniones: Domingos - 10:00 hs"));
    }
}
