/// Obituary listing source and the harvested input file.
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::PageSource;
use crate::config::{ListingConfig, ListingFormat};
use crate::extract::listing::{ObituaryJsonExtractor, ObituaryTableExtractor};
use crate::extract::{ExtractError, FieldExtractor};
use crate::fetch::{FetchRequest, Fetcher, TransportError};
use crate::model::ObituaryRecord;

/// Pages of an obituary listing, requested by page-number query parameter.
pub struct ListingSource<'a, F: Fetcher + ?Sized> {
    fetcher: &'a F,
    config: &'a ListingConfig,
}

impl<'a, F: Fetcher + ?Sized> ListingSource<'a, F> {
    pub fn new(fetcher: &'a F, config: &'a ListingConfig) -> Self {
        Self { fetcher, config }
    }

    fn request(&self, page: u32) -> FetchRequest {
        let mut request = FetchRequest::get(&self.config.url);
        for (key, value) in &self.config.extra_params {
            request = request.query(key, value);
        }
        if let (Some(param), Some(size)) = (&self.config.page_size_param, self.config.page_size) {
            request = request.query(param, size);
        }
        request = request.query(&self.config.page_param, page);
        if let Some(param) = &self.config.timestamp_param {
            request = request.query(param, chrono::Utc::now().timestamp_millis());
        }
        request
    }
}

impl<F: Fetcher + ?Sized> PageSource for ListingSource<'_, F> {
    type Item = ObituaryRecord;

    fn first_page(&self) -> u32 {
        self.config.first_page
    }

    fn fetch_page(&mut self, page: u32) -> Result<String, TransportError> {
        self.fetcher
            .fetch(&self.request(page))
            .map(|response| response.body)
    }

    fn parse_page(&self, body: &str) -> Result<Vec<ObituaryRecord>, ExtractError> {
        match self.config.format {
            ListingFormat::HtmlTable => ObituaryTableExtractor.extract_fields(body),
            ListingFormat::Json => ObituaryJsonExtractor.extract_fields(body),
        }
    }
}

// ── Input file ───────────────────────────────────────────────────────

/// Read the harvested obituary list.
pub fn read_records(path: &Path) -> Result<Vec<ObituaryRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input: {}", path.display()))?;
    let records: Vec<ObituaryRecord> = serde_json::from_str(&data)
        .with_context(|| format!("invalid input JSON: {}", path.display()))?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Write the harvested obituary list as a pretty JSON array.
pub fn write_records(path: &Path, records: &[ObituaryRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(records).context("failed to marshal records")?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write input: {}", path.display()))?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}
