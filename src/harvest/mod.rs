//! Paged harvest loop.
//!
//! Drives a [`PageSource`] page by page through an explicit state machine:
//!
//! ```text
//! Fetching(p) ──ok──▶ Parsing(p) ──items──▶ Fetching(p + 1)
//!     │                   └──empty──▶ Done
//!     ├──transient──▶ Retrying(p, n) ──backoff──▶ Fetching(p)
//!     ├──ceiling─────▶ Done
//!     └──exhausted / permanent──▶ Abandoned(p)
//! ```
//!
//! An abandoned page ends the loop early; whatever was accumulated is still
//! returned. Partial results are a normal outcome, not an error.
pub mod listing;
pub mod retry;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::extract::ExtractError;
use crate::fetch::TransportError;
use retry::{Delay, RetryPolicy};

/// A paginated source: fetch a page body, then parse it into items.
pub trait PageSource {
    type Item;

    /// Index of the first page to request.
    fn first_page(&self) -> u32 {
        1
    }

    fn fetch_page(&mut self, page: u32) -> Result<String, TransportError>;

    /// Parse a fetched page. An empty result marks the end of the data.
    fn parse_page(&self, body: &str) -> Result<Vec<Self::Item>, ExtractError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestState {
    Fetching { page: u32 },
    Parsing { page: u32 },
    Retrying { page: u32, failures: u32 },
    Done,
    Abandoned { page: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Highest page number that will be requested (inclusive).
    pub page_ceiling: u32,
    /// Pause after each page, whatever its outcome.
    pub inter_page_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            page_ceiling: 1000,
            inter_page_delay: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Why a harvest stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestFailure {
    Transport(TransportError),
    Extract(String),
}

#[derive(Debug)]
pub struct HarvestReport<T> {
    pub records: Vec<T>,
    /// Pages that yielded at least one item.
    pub pages: u32,
    pub retries: u32,
    /// Terminal state: [`HarvestState::Done`] or [`HarvestState::Abandoned`].
    pub state: HarvestState,
    pub failure: Option<HarvestFailure>,
}

impl<T> HarvestReport<T> {
    pub fn is_complete(&self) -> bool {
        self.state == HarvestState::Done
    }
}

/// Run the harvest loop to completion.
pub fn harvest<S: PageSource, D: Delay>(
    source: &mut S,
    settings: &HarvestSettings,
    delay: &mut D,
) -> HarvestReport<S::Item> {
    let max_attempts = settings.retry.max_attempts.max(1);
    let mut report = HarvestReport {
        records: Vec::new(),
        pages: 0,
        retries: 0,
        state: HarvestState::Fetching {
            page: source.first_page(),
        },
        failure: None,
    };
    let mut body = String::new();
    let mut failures = 0;

    loop {
        report.state = match report.state {
            HarvestState::Fetching { page } if page > settings.page_ceiling => {
                info!("Reached page ceiling {}", settings.page_ceiling);
                HarvestState::Done
            }
            HarvestState::Fetching { page } => match source.fetch_page(page) {
                Ok(fetched) => {
                    body = fetched;
                    HarvestState::Parsing { page }
                }
                Err(err) if settings.retry.should_retry(&err, failures + 1) => {
                    failures += 1;
                    warn!("Page {page}: attempt {failures}/{max_attempts} failed ({err})");
                    HarvestState::Retrying { page, failures }
                }
                Err(err) => {
                    warn!("Page {page}: giving up ({err})");
                    report.failure = Some(HarvestFailure::Transport(err));
                    delay.wait(settings.inter_page_delay);
                    HarvestState::Abandoned { page }
                }
            },
            HarvestState::Retrying { page, failures } => {
                report.retries += 1;
                delay.wait(settings.retry.backoff(failures));
                HarvestState::Fetching { page }
            }
            HarvestState::Parsing { page } => {
                failures = 0;
                let parsed = source.parse_page(&body);
                delay.wait(settings.inter_page_delay);
                match parsed {
                    Ok(items) if items.is_empty() => {
                        info!("Page {page} is empty, harvest complete");
                        HarvestState::Done
                    }
                    Ok(items) => {
                        debug!("Page {page}: {} items", items.len());
                        report.pages += 1;
                        report.records.extend(items);
                        match page.checked_add(1) {
                            Some(next) => HarvestState::Fetching { page: next },
                            None => HarvestState::Done,
                        }
                    }
                    Err(err) => {
                        warn!("Page {page}: unreadable ({err})");
                        report.failure = Some(HarvestFailure::Extract(err.to_string()));
                        HarvestState::Abandoned { page }
                    }
                }
            }
            HarvestState::Done | HarvestState::Abandoned { .. } => break,
        };
    }

    info!(
        "Harvested {} records from {} pages ({} retries)",
        report.records.len(),
        report.pages,
        report.retries
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Pages scripted as a queue of outcomes per page number.
    struct ScriptedSource {
        pages: HashMap<u32, Vec<Result<String, TransportError>>>,
        calls: Vec<u32>,
        first: u32,
    }

    impl ScriptedSource {
        fn new(script: Vec<(u32, Result<&str, TransportError>)>) -> Self {
            let mut pages: HashMap<u32, Vec<Result<String, TransportError>>> = HashMap::new();
            for (page, outcome) in script {
                pages
                    .entry(page)
                    .or_default()
                    .push(outcome.map(str::to_string));
            }
            for queue in pages.values_mut() {
                queue.reverse();
            }
            Self {
                pages,
                calls: Vec::new(),
                first: 1,
            }
        }
    }

    impl PageSource for ScriptedSource {
        type Item = String;

        fn first_page(&self) -> u32 {
            self.first
        }

        fn fetch_page(&mut self, page: u32) -> Result<String, TransportError> {
            self.calls.push(page);
            self.pages
                .get_mut(&page)
                .and_then(Vec::pop)
                .unwrap_or_else(|| Ok(String::new()))
        }

        fn parse_page(&self, body: &str) -> Result<Vec<String>, ExtractError> {
            if body == "garbage" {
                return Err(ExtractError::Shape("garbage page".into()));
            }
            Ok(body
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect())
        }
    }

    fn settings() -> HarvestSettings {
        HarvestSettings {
            page_ceiling: 100,
            inter_page_delay: Duration::from_millis(10),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(100),
            },
        }
    }

    fn timeout() -> TransportError {
        TransportError::Timeout("slow".into())
    }

    #[test]
    fn test_empty_page_ends_harvest() {
        let mut source = ScriptedSource::new(vec![(1, Ok("a,b")), (2, Ok("c")), (3, Ok(""))]);
        let report = harvest(&mut source, &settings(), &mut |_: Duration| {});

        assert_eq!(report.records, vec!["a", "b", "c"]);
        assert_eq!(report.state, HarvestState::Done);
        assert_eq!(report.retries, 0);
        assert_eq!(report.pages, 2);
        assert!(report.failure.is_none());
        assert_eq!(source.calls, vec![1, 2, 3]);
    }

    #[test]
    fn test_three_transient_failures_abandon_page() {
        let mut source = ScriptedSource::new(vec![
            (1, Ok("a")),
            (2, Err(timeout())),
            (2, Err(timeout())),
            (2, Err(timeout())),
            (2, Ok("never")),
        ]);
        let mut waits = Vec::new();
        let report = harvest(&mut source, &settings(), &mut |d: Duration| waits.push(d));

        assert_eq!(report.records, vec!["a"]);
        assert_eq!(report.state, HarvestState::Abandoned { page: 2 });
        assert_eq!(report.retries, 2);
        assert!(matches!(report.failure, Some(HarvestFailure::Transport(_))));
        assert_eq!(source.calls, vec![1, 2, 2, 2]);
        assert_eq!(
            waits,
            vec![
                Duration::from_millis(10),
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(10),
            ]
        );
    }

    #[test]
    fn test_transient_failure_recovers() {
        let mut source = ScriptedSource::new(vec![
            (1, Err(timeout())),
            (1, Ok("a")),
            (2, Ok("")),
        ]);
        let report = harvest(&mut source, &settings(), &mut |_: Duration| {});

        assert_eq!(report.records, vec!["a"]);
        assert_eq!(report.state, HarvestState::Done);
        assert_eq!(report.retries, 1);
    }

    #[test]
    fn test_permanent_failure_is_not_retried() {
        let mut source = ScriptedSource::new(vec![(
            1,
            Err(TransportError::Status {
                status: 404,
                url: "u".into(),
            }),
        )]);
        let report = harvest(&mut source, &settings(), &mut |_: Duration| {});

        assert!(report.records.is_empty());
        assert_eq!(report.state, HarvestState::Abandoned { page: 1 });
        assert_eq!(source.calls, vec![1]);
    }

    #[test]
    fn test_page_ceiling_stops_harvest() {
        let mut source = ScriptedSource::new(vec![(1, Ok("a")), (2, Ok("b")), (3, Ok("c"))]);
        let settings = HarvestSettings {
            page_ceiling: 2,
            ..settings()
        };
        let report = harvest(&mut source, &settings, &mut |_: Duration| {});

        assert_eq!(report.records, vec!["a", "b"]);
        assert!(report.is_complete());
        assert_eq!(source.calls, vec![1, 2]);
    }

    #[test]
    fn test_last_representable_page_ends_harvest() {
        let mut source = ScriptedSource::new(vec![(u32::MAX, Ok("z"))]);
        source.first = u32::MAX;
        let settings = HarvestSettings {
            page_ceiling: u32::MAX,
            ..settings()
        };
        let report = harvest(&mut source, &settings, &mut |_: Duration| {});

        assert_eq!(report.records, vec!["z"]);
        assert!(report.is_complete());
        assert_eq!(source.calls, vec![u32::MAX]);
    }

    #[test]
    fn test_unparseable_page_keeps_prior_results() {
        let mut source = ScriptedSource::new(vec![(1, Ok("a")), (2, Ok("garbage"))]);
        let report = harvest(&mut source, &settings(), &mut |_: Duration| {});

        assert_eq!(report.records, vec!["a"]);
        assert_eq!(report.state, HarvestState::Abandoned { page: 2 });
        assert!(matches!(report.failure, Some(HarvestFailure::Extract(_))));
    }
}
