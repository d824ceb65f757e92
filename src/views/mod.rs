//! Views derived from the roster: shareable text, paginated document and
//! portable export.

pub mod document;
pub mod export;
pub mod selection;
pub mod text;

pub use document::{render_document, DocumentLayout};
pub use export::{build_export, export_filename};
pub use text::{shareable_text, TextOptions};
