/// Directory search result extractors.
///
/// `LiveSearchExtractor` reads the JSON answer of an autocomplete-style
/// person search; `GenealogyRowsExtractor` reads an HTML results page whose
/// rows carry birthdates and relatives.
use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use super::{ExtractError, FieldExtractor, joined_text, non_blank, split_names};
use crate::model::{CandidateRecord, PERSON_TAG};

// ── Live search (JSON) ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LiveSearchResponse {
    #[serde(default)]
    result: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct LiveSearchHit {
    t: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

/// Reads `{"result": [{"t": "p", "name": …, "link": …}, …]}`.
///
/// The single-letter tag `p` is mapped to the canonical person tag; other
/// tags pass through so the ranker can discard them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveSearchExtractor;

impl FieldExtractor for LiveSearchExtractor {
    type Record = CandidateRecord;

    fn extract_fields(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        let response: LiveSearchResponse = serde_json::from_str(body)?;

        let mut candidates = Vec::with_capacity(response.result.len());
        for value in response.result {
            let hit: LiveSearchHit = match serde_json::from_value(value) {
                Ok(hit) => hit,
                Err(e) => {
                    debug!("Skipping malformed search hit: {e}");
                    continue;
                }
            };

            let type_tag = match hit.t.as_str() {
                "p" => PERSON_TAG.to_string(),
                other => other.to_string(),
            };
            candidates.push(CandidateRecord {
                raw_name: hit.name.unwrap_or_default(),
                type_tag,
                detail_reference: hit.link.unwrap_or_default(),
                birthdate: None,
                relatives: Vec::new(),
            });
        }

        Ok(candidates)
    }
}

// ── Genealogy rows (HTML) ────────────────────────────────────────────

static ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.row").expect("valid selector"));
static NAME_PARTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("strong").expect("valid selector"));
static DETAIL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.detail-link").expect("valid selector"));
static CELLS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));

/// Reads `div.row` result rows: the name from `strong` elements, the detail
/// link from `a.detail-link`, and the cells following `Born:` and `Related:`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenealogyRowsExtractor;

impl FieldExtractor for GenealogyRowsExtractor {
    type Record = CandidateRecord;

    fn extract_fields(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        let document = Html::parse_document(body);
        let mut candidates = Vec::new();

        for row in document.select(&ROWS) {
            let name = row
                .select(&NAME_PARTS)
                .map(|s| joined_text(s, " "))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() {
                continue;
            }

            let Some(link) = row
                .select(&DETAIL_LINK)
                .find_map(|a| a.value().attr("href"))
                .filter(|href| !href.trim().is_empty())
            else {
                debug!("Skipping row for {name}: no detail link");
                continue;
            };

            let cells: Vec<String> = row.select(&CELLS).map(|td| joined_text(td, " ")).collect();
            let after_label = |label: &str| {
                cells
                    .iter()
                    .position(|text| text.contains(label))
                    .and_then(|i| cells.get(i + 1))
                    .cloned()
            };

            candidates.push(CandidateRecord {
                raw_name: name,
                type_tag: PERSON_TAG.to_string(),
                detail_reference: link.trim().to_string(),
                birthdate: after_label("Born:").and_then(non_blank),
                relatives: after_label("Related:")
                    .map(|text| split_names(&text))
                    .unwrap_or_default(),
            });
        }

        Ok(candidates)
    }
}
