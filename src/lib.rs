//! # kinlink: obituary harvester and next-of-kin record linker
//!
//! Harvests obituary listings page by page, then links each deceased person
//! to at most one record in a public people-search directory, persisting
//! progress so interrupted runs resume where they stopped.
//!
//! ## Architecture
//!
//! - **[`model`]**: Query, candidate, and profile records
//! - **[`matcher`]**: Name normalization, similarity scoring, best-of-N ranking, quorum matching
//! - **[`fetch`]**: `Fetcher` transport trait, blocking HTTP session, challenge-solver seam
//! - **[`extract`]**: Markup-to-record extractors for listings, search results, and profiles
//! - **[`harvest`]**: Paged harvest loop with bounded retry and backoff
//! - **[`checkpoint`]**: Resumable query-key → match-result store
//! - **[`link`]**: Per-record linking and the checkpointed batch driver
//! - **[`config`]**: Configuration loading, validation, and defaults

pub mod checkpoint;
pub mod config;
pub mod extract;
pub mod fetch;
pub mod harvest;
pub mod link;
pub mod matcher;
pub mod model;
