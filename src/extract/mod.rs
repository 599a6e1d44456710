//! Markup-to-record extraction.
//!
//! Every page shape the harvester understands gets its own
//! [`FieldExtractor`]; the matching core only ever sees the plain records
//! they produce. Rows missing a required field are skipped individually,
//! never failing the whole page.
pub mod listing;
pub mod profile;
pub mod search;

use scraper::ElementRef;
use thiserror::Error;

/// Errors that make a whole document unreadable.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected document shape: {0}")]
    Shape(String),
}

/// Turns a fetched page body into records.
pub trait FieldExtractor {
    type Record;

    fn extract_fields(&self, body: &str) -> Result<Vec<Self::Record>, ExtractError>;
}

/// Text nodes of `element`, each trimmed, empty ones dropped, joined by `sep`.
pub(crate) fn joined_text(element: ElementRef<'_>, sep: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Split a comma-separated cell into trimmed, non-empty names.
pub(crate) fn split_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn non_blank(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
