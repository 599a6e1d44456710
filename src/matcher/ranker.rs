/// Best-of-N ranking over live-search hits.
///
/// Policy: every valid hit is scored against three comparison targets
/// (`first last`, `last first`, and the top name variant); the single
/// highest score wins, earliest hit first on ties.
use tracing::debug;

use super::similarity::score;
use crate::model::{CandidateRecord, PERSON_TAG, ScoredCandidate};

/// Ranks directory hits for one directory, identified by its person-detail prefix.
#[derive(Debug, Clone)]
pub struct CandidateRanker {
    detail_prefix: String,
}

impl CandidateRanker {
    pub fn new(detail_prefix: impl Into<String>) -> Self {
        Self {
            detail_prefix: detail_prefix.into(),
        }
    }

    /// A hit is rankable only if it is a person listing pointing at this
    /// directory's person-detail pages.
    pub fn is_valid(&self, candidate: &CandidateRecord) -> bool {
        candidate.type_tag == PERSON_TAG
            && candidate.detail_reference.starts_with(&self.detail_prefix)
    }

    /// All `(hit, target)` pairs scoring above zero, best first.
    ///
    /// The sort is stable, so equal scores keep hit order, then target order.
    pub fn potential_matches<'a>(
        &self,
        raw_results: &'a [CandidateRecord],
        first_name: &str,
        last_name: &str,
        name_variants: &[String],
    ) -> Vec<ScoredCandidate<'a>> {
        let mut targets: Vec<Vec<&str>> =
            vec![vec![first_name, last_name], vec![last_name, first_name]];
        if let Some(variant) = name_variants.first() {
            targets.push(vec![variant.as_str()]);
        }

        let mut matches = Vec::new();
        for candidate in raw_results.iter().filter(|c| self.is_valid(c)) {
            for target in &targets {
                let s = score(&candidate.raw_name, target);
                if s > 0 {
                    matches.push(ScoredCandidate {
                        candidate,
                        score: s,
                    });
                }
            }
        }

        matches.sort_by(|a, b| b.score.cmp(&a.score));
        matches
    }

    /// The top-scoring valid hit, or `None` when nothing scores above zero.
    pub fn rank<'a>(
        &self,
        raw_results: &'a [CandidateRecord],
        first_name: &str,
        last_name: &str,
        name_variants: &[String],
    ) -> Option<&'a CandidateRecord> {
        let matches = self.potential_matches(raw_results, first_name, last_name, name_variants);
        debug!(
            "{} of {} hits scored for {first_name} {last_name}",
            matches.len(),
            raw_results.len()
        );
        matches.first().map(|m| m.candidate)
    }
}
