/// Record linking: one obituary in, at most one directory profile out.
///
/// `Linker::link_record` handles a single record and never fails; every
/// per-record problem becomes a [`RecordOutcome::Skipped`]. `run_batch`
/// drives a whole input list against the checkpoint and only returns `Err`
/// when progress can no longer be persisted.
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::config::{ChallengeConfig, Config, DirectoryConfig, SearchStrategy};
use crate::extract::profile::ProfileExtractor;
use crate::extract::search::{GenealogyRowsExtractor, LiveSearchExtractor};
use crate::extract::{ExtractError, FieldExtractor};
use crate::fetch::challenge::ChallengeSolver;
use crate::fetch::{FetchRequest, Fetcher, TransportError, resolve_url};
use crate::harvest::retry::{Delay, with_retry};
use crate::harvest::{HarvestFailure, PageSource, harvest};
use crate::matcher::{CandidateRanker, find_match, name_variants};
use crate::model::{CandidateRecord, ObituaryRecord, PersonProfile, QueryRecord};

// ── Outcomes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The directory could not be reached after retries.
    Transport(TransportError),
    ChallengeUnsolved { url: String },
    /// The record has no usable name.
    InvalidQuery,
    /// A directory response could not be read.
    Extract(String),
}

impl SkipReason {
    /// Whether this skip counts towards the consecutive failure ceiling.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ChallengeUnsolved { .. })
    }

    fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::ChallengeUnsolved { url } => Self::ChallengeUnsolved { url },
            other => Self::Transport(other),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "{err}"),
            Self::ChallengeUnsolved { url } => write!(f, "unsolved challenge at {url}"),
            Self::InvalidQuery => write!(f, "record has no name"),
            Self::Extract(msg) => write!(f, "unreadable response: {msg}"),
        }
    }
}

impl From<ExtractError> for SkipReason {
    fn from(err: ExtractError) -> Self {
        Self::Extract(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Linked(PersonProfile),
    NoMatch,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every input record was visited.
    Completed,
    /// Too many consecutive records failed; the rest were not attempted.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    /// Records already present in the checkpoint when the run started.
    pub resumed: usize,
    pub linked: usize,
    pub no_match: usize,
    pub skipped: usize,
    pub status: BatchStatus,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("failed to export profile to {path}: {source}")]
    Export {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize profile: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Linker ───────────────────────────────────────────────────────────

/// Links obituary records against the configured directory.
pub struct Linker<'a, F: Fetcher + ?Sized, C: ChallengeSolver + ?Sized, D: Delay> {
    fetcher: &'a F,
    solver: &'a C,
    delay: D,
    config: &'a Config,
    progress: bool,
}

impl<'a, F, C, D> Linker<'a, F, C, D>
where
    F: Fetcher + ?Sized,
    C: ChallengeSolver + ?Sized,
    D: Delay,
{
    pub fn new(fetcher: &'a F, solver: &'a C, delay: D, config: &'a Config) -> Self {
        Self {
            fetcher,
            solver,
            delay,
            config,
            progress: false,
        }
    }

    /// Show a progress bar on stderr during [`Linker::run_batch`].
    #[must_use]
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Link a single record.
    pub fn link_record(&mut self, record: &ObituaryRecord) -> RecordOutcome {
        let Some(query) = QueryRecord::from_obituary(record) else {
            return RecordOutcome::Skipped(SkipReason::InvalidQuery);
        };
        let config = self.config;
        let names = SearchNames::for_query(&query, config.search_strategy);
        debug!(
            "Searching {} as {} {}",
            query.key(),
            names.first,
            names.last
        );

        let result = match &config.directory {
            DirectoryConfig::LiveSearch {
                search_url,
                person_prefix,
            } => self.link_live_search(&names, search_url, person_prefix),
            DirectoryConfig::Genealogy {
                search_url,
                base_url,
                location,
                page_param,
                page_ceiling,
                challenge,
            } => {
                let search = GenealogySearch {
                    fetcher: self.fetcher,
                    solver: self.solver,
                    search_url,
                    page_param,
                    first: &names.first,
                    last: &names.last,
                    location: location
                        .as_deref()
                        .or(query.location_hint())
                        .unwrap_or_default(),
                    challenge: challenge.as_ref(),
                    token: None,
                };
                self.link_genealogy(&query, search, base_url, *page_ceiling)
            }
        };

        match result {
            Ok(Some(profile)) => RecordOutcome::Linked(profile),
            Ok(None) => RecordOutcome::NoMatch,
            Err(reason) => RecordOutcome::Skipped(reason),
        }
    }

    /// Best-of-N over name variants; the first variant with a ranked hit wins.
    fn link_live_search(
        &mut self,
        names: &SearchNames,
        search_url: &str,
        person_prefix: &str,
    ) -> Result<Option<PersonProfile>, SkipReason> {
        let variants = name_variants(&names.first, names.middle.as_deref(), &names.last);
        let ranker = CandidateRanker::new(person_prefix);
        let policy = self.config.retry.policy();
        let fetcher = self.fetcher;

        for variant in &variants {
            let request = FetchRequest::post(search_url)
                .form("q", variant)
                .header("Accept", "application/json");
            let response = with_retry(&policy, &mut self.delay, variant, || {
                fetcher.fetch(&request)
            })
            .map_err(|e| SkipReason::from_transport(e.into_transport()))?;

            let hits = LiveSearchExtractor.extract_fields(&response.body)?;
            if let Some(best) = ranker.rank(&hits, &names.first, &names.last, &variants) {
                info!("Matched variant '{variant}' to {}", best.raw_name);
                return self.fetch_profile(&best.detail_reference).map(Some);
            }
            debug!("No ranked hit for '{variant}'");
        }

        Ok(None)
    }

    /// Harvest every result page, then take the first candidate reaching quorum.
    fn link_genealogy(
        &mut self,
        query: &QueryRecord,
        mut search: GenealogySearch<'_, F, C>,
        base_url: &str,
        page_ceiling: u32,
    ) -> Result<Option<PersonProfile>, SkipReason> {
        let settings = self.config.retry.harvest_settings(page_ceiling);
        let report = harvest(&mut search, &settings, &mut self.delay);

        if let Some(detail) = find_match(query, &report.records) {
            let url = resolve_url(base_url, detail);
            info!("Quorum match for {}: {url}", query.key());
            return self.fetch_profile(&url).map(Some);
        }

        match report.failure {
            Some(HarvestFailure::Transport(err)) => Err(SkipReason::from_transport(err)),
            Some(HarvestFailure::Extract(msg)) => Err(SkipReason::Extract(msg)),
            None => Ok(None),
        }
    }

    fn fetch_profile(&mut self, url: &str) -> Result<PersonProfile, SkipReason> {
        let request = FetchRequest::get(url);
        let policy = self.config.retry.policy();
        let fetcher = self.fetcher;
        let response = with_retry(&policy, &mut self.delay, url, || fetcher.fetch(&request))
            .map_err(|e| SkipReason::from_transport(e.into_transport()))?;
        Ok(ProfileExtractor.extract(&response.body))
    }

    /// Link every record not yet in the checkpoint, saving after each outcome.
    ///
    /// Skipped records are not written, so the next run retries them. More
    /// than `max_consecutive_failures` failing records in a row abort the run.
    pub fn run_batch(
        &mut self,
        records: &[ObituaryRecord],
        store: &CheckpointStore,
    ) -> Result<BatchSummary, LinkError> {
        let mut checkpoint = store.load()?;
        let resumed = records
            .iter()
            .filter(|r| checkpoint.contains_key(&r.name))
            .count();

        let mut summary = BatchSummary {
            total: records.len(),
            resumed,
            linked: 0,
            no_match: 0,
            skipped: 0,
            status: BatchStatus::Completed,
        };
        info!(
            "Linking {} records ({} already done)",
            records.len() - resumed,
            resumed
        );

        let pb = self.progress_bar((records.len() - resumed) as u64);
        let ceiling = self.config.max_consecutive_failures;
        let mut consecutive_failures = 0;

        for record in records {
            if checkpoint.contains_key(&record.name) {
                continue;
            }
            pb.set_message(record.name.clone());

            match self.link_record(record) {
                RecordOutcome::Linked(profile) => {
                    if let Some(dir) = &self.config.profile_dir {
                        export_profile(Path::new(dir), record, &profile)?;
                    }
                    checkpoint.insert(record.name.clone(), Some(profile));
                    store.save(&checkpoint)?;
                    summary.linked += 1;
                    consecutive_failures = 0;
                }
                RecordOutcome::NoMatch => {
                    info!("No match for {}", record.name);
                    checkpoint.insert(record.name.clone(), None);
                    store.save(&checkpoint)?;
                    summary.no_match += 1;
                    consecutive_failures = 0;
                }
                RecordOutcome::Skipped(reason) => {
                    warn!("Skipping {}: {reason}", record.name);
                    summary.skipped += 1;
                    if reason.is_failure() {
                        consecutive_failures += 1;
                        if consecutive_failures > ceiling {
                            warn!("{consecutive_failures} consecutive failures, aborting run");
                            summary.status = BatchStatus::Aborted;
                            break;
                        }
                    }
                }
            }
            pb.inc(1);
        }

        pb.finish_and_clear();
        info!(
            "Linked {}, no match {}, skipped {} ({:?})",
            summary.linked, summary.no_match, summary.skipped, summary.status
        );
        Ok(summary)
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {pos}/{len} {wide_msg}")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb
    }
}

// ── Search names ─────────────────────────────────────────────────────

/// Names sent to the directory for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchNames {
    first: String,
    middle: Option<String>,
    /// Empty for single-token names.
    last: String,
}

impl SearchNames {
    fn for_query(query: &QueryRecord, strategy: SearchStrategy) -> Self {
        let last = if query.name_parts().len() > 1 {
            query.last_name().to_string()
        } else {
            String::new()
        };

        let relative_first = match strategy {
            SearchStrategy::Relative => query
                .relatives()
                .first()
                .and_then(|r| r.split_whitespace().next())
                .map(str::to_string),
            SearchStrategy::Deceased => None,
        };

        match relative_first {
            Some(first) => Self {
                first,
                middle: None,
                last,
            },
            None => Self {
                first: query.first_name().to_string(),
                middle: query.middle_name(),
                last,
            },
        }
    }
}

// ── Genealogy search pages ───────────────────────────────────────────

/// Result pages of one genealogy search, with challenge handling.
struct GenealogySearch<'s, F: Fetcher + ?Sized, C: ChallengeSolver + ?Sized> {
    fetcher: &'s F,
    solver: &'s C,
    search_url: &'s str,
    page_param: &'s str,
    first: &'s str,
    last: &'s str,
    location: &'s str,
    challenge: Option<&'s ChallengeConfig>,
    /// Last solved token, sent with every later page of this search.
    token: Option<String>,
}

impl<'s, F: Fetcher + ?Sized, C: ChallengeSolver + ?Sized> GenealogySearch<'s, F, C> {
    fn request(&self, page: u32) -> FetchRequest {
        let mut request = FetchRequest::get(self.search_url)
            .query("first", self.first)
            .query("last", self.last)
            .query("citystatezip", self.location);
        if page > 1 {
            request = request.query(self.page_param, page);
        }
        if let (Some(challenge), Some(token)) = (self.challenge, &self.token) {
            request = request.header(&challenge.header, token);
        }
        request
    }

    fn challenge_for(&self, err: &TransportError) -> Option<&'s ChallengeConfig> {
        let status = err.status()?;
        self.challenge.filter(|c| c.statuses.contains(&status))
    }
}

impl<F: Fetcher + ?Sized, C: ChallengeSolver + ?Sized> PageSource for GenealogySearch<'_, F, C> {
    type Item = CandidateRecord;

    fn fetch_page(&mut self, page: u32) -> Result<String, TransportError> {
        let request = self.request(page);
        let err = match self.fetcher.fetch(&request) {
            Ok(response) => return Ok(response.body),
            Err(err) => err,
        };

        let Some(challenge) = self.challenge_for(&err) else {
            return Err(err);
        };
        info!("Challenge on page {page} ({err}), consulting solver");
        let Some(token) = self.solver.solve(&challenge.url, &challenge.site_key) else {
            return Err(TransportError::ChallengeUnsolved {
                url: challenge.url.clone(),
            });
        };

        let header = challenge.header.clone();
        self.token = Some(token.clone());
        let retried = FetchRequest {
            headers: request
                .headers
                .into_iter()
                .filter(|(name, _)| !name.eq_ignore_ascii_case(&header))
                .collect(),
            ..request
        }
        .header(&header, token);
        self.fetcher.fetch(&retried).map(|response| response.body)
    }

    fn parse_page(&self, body: &str) -> Result<Vec<CandidateRecord>, ExtractError> {
        GenealogyRowsExtractor.extract_fields(body)
    }
}

// ── Profile export ───────────────────────────────────────────────────

/// `<First>_<Last>.json` for the record's own name.
fn export_file_name(record: &ObituaryRecord) -> String {
    let parts: Vec<&str> = record.name.split_whitespace().collect();
    let stem = match parts.as_slice() {
        [] => "unnamed".to_string(),
        [only] => (*only).to_string(),
        [first, .., last] => format!("{first}_{last}"),
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{stem}.json")
}

fn export_profile(
    dir: &Path,
    record: &ObituaryRecord,
    profile: &PersonProfile,
) -> Result<(), LinkError> {
    let path = dir.join(export_file_name(record));
    let export_error = |source| LinkError::Export {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(export_error)?;
    let data = serde_json::to_string_pretty(profile)?;
    std::fs::write(&path, data).map_err(export_error)?;
    debug!("Exported profile to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use crate::fetch::challenge::NoSolver;
    use crate::fetch::mock::{MockFetcher, ok, status, timeout, url_is};
    use std::time::Duration;
    use tempfile::tempdir;

    const SEARCH: &str = "https://people.test/api/search";
    const PREFIX: &str = "https://people.test/person/";

    fn live_config() -> Config {
        let mut config = Config::default();
        config.directory = DirectoryConfig::LiveSearch {
            search_url: SEARCH.to_string(),
            person_prefix: PREFIX.to_string(),
        };
        config.max_consecutive_failures = 1;
        config
    }

    fn record(name: &str) -> ObituaryRecord {
        ObituaryRecord {
            name: name.to_string(),
            ..ObituaryRecord::default()
        }
    }

    fn no_wait(_: Duration) {}

    fn query_is(q: &str) -> impl Fn(&FetchRequest) -> bool + 'static {
        let q = q.to_string();
        move |req| req.url == SEARCH && req.form_value("q") == Some(q.as_str())
    }

    #[test]
    fn test_search_names_strategies() {
        let relatives = vec!["Mary Ann Smith".to_string()];
        let query = QueryRecord::new("John Paul Smith", None, &relatives, None).unwrap();

        let own = SearchNames::for_query(&query, SearchStrategy::Deceased);
        assert_eq!(own.first, "John");
        assert_eq!(own.middle.as_deref(), Some("Paul"));
        assert_eq!(own.last, "Smith");

        let kin = SearchNames::for_query(&query, SearchStrategy::Relative);
        assert_eq!(kin.first, "Mary");
        assert!(kin.middle.is_none());
        assert_eq!(kin.last, "Smith");

        let single = QueryRecord::new("Cher", None, &[], None).unwrap();
        let names = SearchNames::for_query(&single, SearchStrategy::Relative);
        assert_eq!(names.first, "Cher");
        assert_eq!(names.last, "");
    }

    #[test]
    fn test_live_search_tries_variants_in_order() {
        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(query_is("John Smith"), ok(r#"{"result": []}"#))
            .always(
                query_is("John S"),
                ok(format!(
                    r#"{{"result": [{{"t": "p", "name": "John Smith", "link": "{PREFIX}js"}}]}}"#
                )),
            )
            .always(
                url_is(&format!("{PREFIX}js")),
                ok(r#"<h1 class="person-name">John Smith</h1>"#),
            );

        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let outcome = linker.link_record(&record("John Smith"));

        let RecordOutcome::Linked(profile) = outcome else {
            panic!("expected a link, got {outcome:?}");
        };
        assert_eq!(profile.full_name, "John Smith");
        let queries: Vec<String> = mock
            .requests()
            .iter()
            .filter_map(|r| r.form_value("q").map(str::to_string))
            .collect();
        assert_eq!(queries, vec!["John Smith", "John S"], "later variants not tried");
    }

    #[test]
    fn test_live_search_no_match() {
        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(|req: &FetchRequest| req.url == SEARCH, ok(r#"{"result": []}"#));

        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        assert_eq!(linker.link_record(&record("John Smith")), RecordOutcome::NoMatch);
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_live_search_transport_exhaustion_skips() {
        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(|_: &FetchRequest| true, timeout());

        let mut waits = Vec::new();
        let mut linker = Linker::new(&mock, &NoSolver, |d: Duration| waits.push(d), &config);
        let outcome = linker.link_record(&record("John Smith"));
        drop(linker);

        assert!(matches!(
            outcome,
            RecordOutcome::Skipped(SkipReason::Transport(TransportError::Timeout(_)))
        ));
        assert_eq!(mock.request_count(), 3);
        assert_eq!(waits, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn test_blank_name_is_invalid() {
        let config = live_config();
        let mock = MockFetcher::new();
        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        assert_eq!(
            linker.link_record(&record("  ")),
            RecordOutcome::Skipped(SkipReason::InvalidQuery)
        );
        assert_eq!(mock.request_count(), 0);
    }

    fn genealogy_config(challenge: Option<ChallengeConfig>) -> Config {
        let mut config = Config::default();
        config.directory = DirectoryConfig::Genealogy {
            search_url: "https://records.test/results".to_string(),
            base_url: "https://records.test".to_string(),
            location: None,
            page_param: "page".to_string(),
            page_ceiling: 3,
            challenge,
        };
        config
    }

    fn challenge() -> ChallengeConfig {
        ChallengeConfig {
            url: "https://records.test/challenge".to_string(),
            site_key: "site".to_string(),
            header: "X-Token".to_string(),
            statuses: vec![403],
            token_env: None,
        }
    }

    struct FixedSolver(&'static str);

    impl ChallengeSolver for FixedSolver {
        fn solve(&self, _challenge_url: &str, _site_key: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    const ROW: &str = r#"<div class="row"><table>
        <tr><td><strong>Ann</strong> <strong>Lee</strong></td></tr>
        <tr><td>Born:</td><td>1/2/1940</td></tr></table>
        <a class="detail-link" href="/person/ann">View</a></div>"#;

    fn is_results_page(page: Option<&'static str>) -> impl Fn(&FetchRequest) -> bool + 'static {
        move |req| {
            req.url == "https://records.test/results" && req.query_value("page") == page
        }
    }

    #[test]
    fn test_genealogy_quorum_link_with_location_hint() {
        let config = genealogy_config(None);
        let mock = MockFetcher::new();
        mock.always(is_results_page(None), ok(ROW))
            .always(is_results_page(Some("2")), ok("<html></html>"))
            .always(
                url_is("https://records.test/person/ann"),
                ok(r#"<h1 class="person-name">Ann Lee</h1>"#),
            );

        let obituary = ObituaryRecord {
            name: "Ann Lee".to_string(),
            birth_date: Some("01/02/1940".to_string()),
            publication_place: Some("Utica, NY".to_string()),
            ..ObituaryRecord::default()
        };
        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let outcome = linker.link_record(&obituary);

        assert!(matches!(outcome, RecordOutcome::Linked(ref p) if p.full_name == "Ann Lee"));
        let first = &mock.requests()[0];
        assert_eq!(first.query_value("first"), Some("Ann"));
        assert_eq!(first.query_value("last"), Some("Lee"));
        assert_eq!(first.query_value("citystatezip"), Some("Utica, NY"));
    }

    #[test]
    fn test_genealogy_challenge_solved_with_token() {
        let config = genealogy_config(Some(challenge()));
        let mock = MockFetcher::new();
        mock.always(
            |req: &FetchRequest| req.header_value("X-Token") == Some("tok") && req.query_value("page").is_none(),
            ok(ROW),
        )
        .always(is_results_page(None), status(403, "https://records.test/results"))
        .always(is_results_page(Some("2")), ok(""))
        .always(
            url_is("https://records.test/person/ann"),
            ok(r#"<h1 class="person-name">Ann Lee</h1>"#),
        );

        let obituary = ObituaryRecord {
            name: "Ann Lee".to_string(),
            birth_date: Some("1940".to_string()),
            ..ObituaryRecord::default()
        };
        let solver = FixedSolver("tok");
        let mut linker = Linker::new(&mock, &solver, no_wait, &config);
        assert!(matches!(linker.link_record(&obituary), RecordOutcome::Linked(_)));

        let page_two = mock
            .requests()
            .into_iter()
            .find(|r| r.query_value("page") == Some("2"))
            .unwrap();
        assert_eq!(page_two.header_value("X-Token"), Some("tok"));
    }

    #[test]
    fn test_genealogy_unsolved_challenge_skips() {
        let config = genealogy_config(Some(challenge()));
        let mock = MockFetcher::new();
        mock.always(is_results_page(None), status(403, "https://records.test/results"));

        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let outcome = linker.link_record(&record("Ann Lee"));
        assert_eq!(
            outcome,
            RecordOutcome::Skipped(SkipReason::ChallengeUnsolved {
                url: "https://records.test/challenge".to_string()
            })
        );
        assert_eq!(mock.request_count(), 1, "unsolved challenges are not retried");
    }

    #[test]
    fn test_batch_aborts_past_failure_ceiling() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("matches.json"));
        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(|_: &FetchRequest| true, status(503, SEARCH));

        let records = vec![record("A One"), record("B Two"), record("C Three")];
        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let summary = linker.run_batch(&records, &store).unwrap();

        assert_eq!(summary.status, BatchStatus::Aborted);
        assert_eq!(summary.skipped, 2);
        assert!(store.load().unwrap().is_empty(), "skips are never checkpointed");
    }

    #[test]
    fn test_batch_records_no_match_and_exports() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("matches.json"));
        let mut config = live_config();
        let profiles = dir.path().join("profiles");
        config.profile_dir = Some(profiles.to_string_lossy().into_owned());

        let mock = MockFetcher::new();
        mock.always(
            query_is("John Smith"),
            ok(format!(
                r#"{{"result": [{{"t": "p", "name": "John Smith", "link": "{PREFIX}js"}}]}}"#
            )),
        )
        .always(
            url_is(&format!("{PREFIX}js")),
            ok(r#"<h1 class="person-name">John Smith</h1>"#),
        )
        .always(|req: &FetchRequest| req.url == SEARCH, ok(r#"{"result": []}"#));

        let records = vec![record("John Smith"), record("Ann Lee")];
        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let summary = linker.run_batch(&records, &store).unwrap();

        assert_eq!(summary.status, BatchStatus::Completed);
        assert_eq!((summary.linked, summary.no_match), (1, 1));

        let checkpoint: Checkpoint = store.load().unwrap();
        assert!(checkpoint["John Smith"].is_some());
        assert_eq!(checkpoint["Ann Lee"], None);
        assert!(profiles.join("John_Smith.json").exists());
    }

    #[test]
    fn test_batch_halts_when_checkpoint_cannot_be_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches.json");
        // A directory squatting on the temp-file path makes every save fail.
        std::fs::create_dir(dir.path().join("matches.json.tmp")).unwrap();
        let store = CheckpointStore::new(&path);

        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(|req: &FetchRequest| req.url == SEARCH, ok(r#"{"result": []}"#));

        let records = vec![record("Ann Lee"), record("Bo Park")];
        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let result = linker.run_batch(&records, &store);

        assert!(matches!(
            result,
            Err(LinkError::Checkpoint(CheckpointError::Write { .. }))
        ));
        let queries: Vec<String> = mock
            .requests()
            .iter()
            .filter_map(|r| r.form_value("q").map(str::to_string))
            .collect();
        assert_eq!(queries.len(), 3);
        assert!(queries.iter().all(|q| q.starts_with("Ann") || q.starts_with("Lee")));
        assert!(!path.exists());
    }

    #[test]
    fn test_batch_refuses_corrupt_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("matches.json");
        std::fs::write(&path, "{\"Ann Lee\": nul").unwrap();
        let store = CheckpointStore::new(&path);

        let config = live_config();
        let mock = MockFetcher::new();
        mock.always(|_: &FetchRequest| true, ok(r#"{"result": []}"#));

        let mut linker = Linker::new(&mock, &NoSolver, no_wait, &config);
        let result = linker.run_batch(&[record("Ann Lee"), record("Bo Park")], &store);

        assert!(matches!(
            result,
            Err(LinkError::Checkpoint(CheckpointError::Corrupt { .. }))
        ));
        assert_eq!(mock.request_count(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"Ann Lee\": nul");
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(&record("John Paul Smith")), "John_Smith.json");
        assert_eq!(export_file_name(&record("O'Neil")), "O_Neil.json");
        assert_eq!(export_file_name(&record("")), "unnamed.json");
    }
}
