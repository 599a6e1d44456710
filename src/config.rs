/// Configuration module for kinlink.
///
/// Handles loading, validating, and providing default configuration values,
/// and converts them into the settings structs the library consumes.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::harvest::HarvestSettings;
use crate::harvest::retry::RetryPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "kinlink.json";

// ── Default value functions ──────────────────────────────────────────

fn default_input_path() -> String {
    "./obituaries.json".to_string()
}

fn default_checkpoint_path() -> String {
    "./matches.json".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("kinlink/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_inter_page_delay_ms() -> u64 {
    1000
}

fn default_max_consecutive_failures() -> u32 {
    10
}

fn default_page_param() -> String {
    "pg".to_string()
}

fn default_first_page() -> u32 {
    1
}

fn default_page_ceiling() -> u32 {
    1000
}

fn default_listing_url() -> String {
    "https://obituaries.example.com/search/collections/obituaries".to_string()
}

fn default_live_search_url() -> String {
    "https://people.example.com/api/search".to_string()
}

fn default_person_prefix() -> String {
    "https://people.example.com/person/".to_string()
}

fn default_genealogy_search_url() -> String {
    "https://records.example.com/results".to_string()
}

fn default_genealogy_base_url() -> String {
    "https://records.example.com".to_string()
}

fn default_genealogy_page_param() -> String {
    "page".to_string()
}

fn default_genealogy_page_ceiling() -> u32 {
    5
}

fn default_challenge_header() -> String {
    "X-Challenge-Token".to_string()
}

fn default_challenge_statuses() -> Vec<u16> {
    vec![403, 429, 500, 502, 503]
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Harvested obituary list; written by `harvest`, read by `link`.
    #[serde(default = "default_input_path")]
    pub input_path: String,

    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: String,

    /// Optional directory for per-person profile exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<String>,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    #[serde(default)]
    pub search_strategy: SearchStrategy,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub obituaries: ListingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_inter_page_delay_ms")]
    pub inter_page_delay_ms: u64,
}

/// Whose first name goes into the directory search.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// The deceased's own first name.
    #[default]
    Deceased,
    /// The first listed relative's first name, with the deceased's surname.
    ///
    /// Live-search only: the genealogy quorum compares results against the
    /// deceased's own name and birthdate, so `validate` rejects this pairing.
    Relative,
}

/// The people directory records are linked against.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DirectoryConfig {
    /// JSON autocomplete search, ranked best-of-N.
    LiveSearch {
        #[serde(default = "default_live_search_url")]
        search_url: String,

        /// Detail links must start with this prefix to be considered.
        #[serde(default = "default_person_prefix")]
        person_prefix: String,
    },

    /// Paged HTML results with birthdates and relatives, quorum-matched.
    Genealogy {
        #[serde(default = "default_genealogy_search_url")]
        search_url: String,

        #[serde(default = "default_genealogy_base_url")]
        base_url: String,

        /// Fixed `citystatezip` value; falls back to the record's location.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,

        #[serde(default = "default_genealogy_page_param")]
        page_param: String,

        #[serde(default = "default_genealogy_page_ceiling")]
        page_ceiling: u32,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        challenge: Option<ChallengeConfig>,
    },
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ChallengeConfig {
    /// Page the challenge is presented on; passed to the solver.
    pub url: String,

    #[serde(default)]
    pub site_key: String,

    /// Header carrying the solved token on the retried request.
    #[serde(default = "default_challenge_header")]
    pub header: String,

    #[serde(default = "default_challenge_statuses")]
    pub statuses: Vec<u16>,

    /// Environment variable holding an operator-supplied token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    #[default]
    HtmlTable,
    Json,
}

/// Paged obituary listing used by `harvest`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ListingConfig {
    #[serde(default = "default_listing_url")]
    pub url: String,

    #[serde(default)]
    pub format: ListingFormat,

    #[serde(default = "default_page_param")]
    pub page_param: String,

    #[serde(default = "default_first_page")]
    pub first_page: u32,

    #[serde(default = "default_page_ceiling")]
    pub page_ceiling: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size_param: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Cache-busting millisecond timestamp parameter, if the feed wants one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_param: Option<String>,

    /// Fixed query parameters sent with every page request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_params: Vec<(String, String)>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            checkpoint_path: default_checkpoint_path(),
            profile_dir: None,
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
            max_consecutive_failures: default_max_consecutive_failures(),
            search_strategy: SearchStrategy::default(),
            directory: DirectoryConfig::default(),
            obituaries: ListingConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            headers: Vec::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            inter_page_delay_ms: default_inter_page_delay_ms(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::LiveSearch {
            search_url: default_live_search_url(),
            person_prefix: default_person_prefix(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: default_listing_url(),
            format: ListingFormat::default(),
            page_param: default_page_param(),
            first_page: default_first_page(),
            page_ceiling: default_page_ceiling(),
            page_size_param: None,
            page_size: None,
            timestamp_param: None,
            extra_params: Vec::new(),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
        }
    }

    pub fn harvest_settings(&self, page_ceiling: u32) -> HarvestSettings {
        HarvestSettings {
            page_ceiling,
            inter_page_delay: Duration::from_millis(self.inter_page_delay_ms),
            retry: self.policy(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and generates a
    /// template when the default path is in use.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.input_path.is_empty(), "input_path must be set");
        anyhow::ensure!(
            !self.checkpoint_path.is_empty(),
            "checkpoint_path must be set"
        );
        anyhow::ensure!(self.http.timeout_secs > 0, "http.timeout_secs must be positive");
        anyhow::ensure!(
            self.retry.max_attempts > 0,
            "retry.max_attempts must be positive"
        );
        anyhow::ensure!(
            self.max_consecutive_failures > 0,
            "max_consecutive_failures must be positive"
        );

        match &self.directory {
            DirectoryConfig::LiveSearch {
                search_url,
                person_prefix,
            } => {
                anyhow::ensure!(!search_url.is_empty(), "directory.search_url must be set");
                anyhow::ensure!(
                    !person_prefix.is_empty(),
                    "directory.person_prefix must be set"
                );
            }
            DirectoryConfig::Genealogy {
                search_url,
                base_url,
                page_ceiling,
                challenge,
                ..
            } => {
                anyhow::ensure!(!search_url.is_empty(), "directory.search_url must be set");
                anyhow::ensure!(!base_url.is_empty(), "directory.base_url must be set");
                anyhow::ensure!(*page_ceiling > 0, "directory.page_ceiling must be positive");
                anyhow::ensure!(
                    self.search_strategy == SearchStrategy::Deceased,
                    "search_strategy relative is not supported with the genealogy directory"
                );
                if let Some(challenge) = challenge {
                    anyhow::ensure!(
                        !challenge.url.is_empty(),
                        "directory.challenge.url must be set"
                    );
                    anyhow::ensure!(
                        !challenge.header.is_empty(),
                        "directory.challenge.header must be set"
                    );
                }
            }
        }

        anyhow::ensure!(!self.obituaries.url.is_empty(), "obituaries.url must be set");
        anyhow::ensure!(
            self.obituaries.page_ceiling > 0,
            "obituaries.page_ceiling must be positive"
        );
        anyhow::ensure!(
            self.obituaries.first_page <= self.obituaries.page_ceiling,
            "obituaries.first_page must not exceed obituaries.page_ceiling"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
