/// Obituary listing extractors: labelled HTML result tables and JSON feeds.
use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::debug;

use super::{ExtractError, FieldExtractor, joined_text, non_blank, split_names};
use crate::model::ObituaryRecord;

static RESULT_ROWS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("table.collection-results-table tbody tr").expect("valid selector")
});
static LABELLED_CELLS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td[data-label]").expect("valid selector"));

// ── HTML table ───────────────────────────────────────────────────────

/// Rows of a results table whose cells carry a `data-label` attribute
/// (`Name`, `Birth Date`, `Death Date`, `Publication Place`, `Relatives`).
#[derive(Debug, Default, Clone, Copy)]
pub struct ObituaryTableExtractor;

impl FieldExtractor for ObituaryTableExtractor {
    type Record = ObituaryRecord;

    fn extract_fields(&self, body: &str) -> Result<Vec<ObituaryRecord>, ExtractError> {
        let document = Html::parse_document(body);
        let mut records = Vec::new();

        for row in document.select(&RESULT_ROWS) {
            let cells: HashMap<&str, ElementRef<'_>> = row
                .select(&LABELLED_CELLS)
                .filter_map(|cell| Some((cell.value().attr("data-label")?, cell)))
                .collect();
            let field = |label: &str| {
                cells
                    .get(label)
                    .map(|cell| joined_text(*cell, " "))
                    .and_then(non_blank)
            };

            let Some(name) = field("Name") else {
                debug!("Skipping listing row without a name");
                continue;
            };

            records.push(ObituaryRecord {
                name,
                birth_date: field("Birth Date"),
                death_date: field("Death Date"),
                publication_place: field("Publication Place"),
                relatives: cells
                    .get("Relatives")
                    .map(|cell| split_names(&joined_text(*cell, ",")))
                    .unwrap_or_default(),
            });
        }

        Ok(records)
    }
}

// ── JSON feed ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    middle_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    birth_date: Option<String>,
    #[serde(default)]
    death_date: Option<String>,
}

/// A JSON array of `{first_name, middle_name, last_name, birth_date,
/// death_date}` objects. An empty array (or empty body) ends the feed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObituaryJsonExtractor;

impl FieldExtractor for ObituaryJsonExtractor {
    type Record = ObituaryRecord;

    fn extract_fields(&self, body: &str) -> Result<Vec<ObituaryRecord>, ExtractError> {
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries = match serde_json::from_str::<serde_json::Value>(body)? {
            serde_json::Value::Array(entries) => entries,
            serde_json::Value::Null => return Ok(Vec::new()),
            other => {
                return Err(ExtractError::Shape(format!(
                    "expected an array of obituaries, got {}",
                    json_kind(&other)
                )));
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry: FeedEntry = match serde_json::from_value(entry) {
                Ok(e) => e,
                Err(e) => {
                    debug!("Skipping malformed feed entry: {e}");
                    continue;
                }
            };

            let name = [&entry.first_name, &entry.middle_name, &entry.last_name]
                .into_iter()
                .filter_map(|part| part.as_deref().map(str::trim))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                debug!("Skipping feed entry without a name");
                continue;
            }

            records.push(ObituaryRecord {
                name,
                birth_date: entry.birth_date.and_then(non_blank),
                death_date: entry.death_date.and_then(non_blank),
                publication_place: None,
                relatives: Vec::new(),
            });
        }

        Ok(records)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
