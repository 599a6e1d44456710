//! Record-linkage engine.
//!
//! - [`normalize`]: name canonicalization and search-name variants
//! - [`similarity`]: word-overlap score and edit-similarity ratio
//! - [`ranker`]: best-of-N selection over live-search hits
//! - [`quorum`]: first-qualifying, 2-of-3 signal matching over richer records
pub mod normalize;
pub mod quorum;
pub mod ranker;
pub mod similarity;

pub use normalize::{name_variants, normalize_name};
pub use quorum::{MatchSignals, find_match};
pub use ranker::CandidateRanker;
pub use similarity::{names_match, score, sequence_ratio};
