/// Quorum matching for directories that expose birthdates and relatives.
///
/// Policy: three independent signals (name, birthdate, relatives); a
/// candidate is accepted when at least [`QUORUM`] agree, and the first
/// accepted candidate in supplied order wins. Unlike the ranker, later and
/// possibly stronger candidates are never considered.
use std::collections::HashSet;

use tracing::debug;

use super::normalize::normalize_name;
use super::similarity::names_match;
use crate::model::{CandidateRecord, QueryRecord};

/// Number of agreeing signals required to accept a candidate.
pub const QUORUM: usize = 2;

/// Per-candidate signal outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchSignals {
    pub name: bool,
    pub birthdate: bool,
    pub relatives: bool,
}

impl MatchSignals {
    pub fn evaluate(query: &QueryRecord, candidate: &CandidateRecord) -> Self {
        Self {
            name: names_match(&query.full_name(), &candidate.raw_name),
            birthdate: birthdates_match(query.birthdate(), candidate.birthdate.as_deref()),
            relatives: relatives_overlap(query.relatives(), &candidate.relatives),
        }
    }

    pub fn agreeing(&self) -> usize {
        [self.name, self.birthdate, self.relatives]
            .into_iter()
            .filter(|s| *s)
            .count()
    }

    pub fn is_quorum(&self) -> bool {
        self.agreeing() >= QUORUM
    }
}

/// Detail reference of the first candidate reaching quorum.
pub fn find_match<'a>(query: &QueryRecord, candidates: &'a [CandidateRecord]) -> Option<&'a str> {
    candidates.iter().find_map(|candidate| {
        let signals = MatchSignals::evaluate(query, candidate);
        debug!("{} vs {}: {signals:?}", query.key(), candidate.raw_name);
        signals
            .is_quorum()
            .then_some(candidate.detail_reference.as_str())
    })
}

fn date_components(date: &str) -> Vec<&str> {
    date.split('/')
        .map(|part| part.trim().trim_start_matches('0'))
        .collect()
}

/// Lenient birthdate comparison over `/`-delimited dates.
///
/// Matches on exact equality, on component-wise equality once leading zeros
/// are stripped, or on the final (year) component alone. The
/// day-or-month-plus-year rule is implied by the year rule. A missing date on
/// either side never matches.
pub fn birthdates_match(a: Option<&str>, b: Option<&str>) -> bool {
    let (Some(a), Some(b)) = (a.map(str::trim), b.map(str::trim)) else {
        return false;
    };
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }

    let left = date_components(a);
    let right = date_components(b);
    if left == right {
        return true;
    }

    match (left.last(), right.last()) {
        (Some(year_a), Some(year_b)) => !year_a.is_empty() && year_a == year_b,
        _ => false,
    }
}

/// Whether the two relative lists share at least one normalized name.
pub fn relatives_overlap<A: AsRef<str>, B: AsRef<str>>(a: &[A], b: &[B]) -> bool {
    let left: HashSet<String> = a
        .iter()
        .map(|n| normalize_name(n.as_ref()))
        .filter(|n| !n.is_empty())
        .collect();
    b.iter()
        .map(|n| normalize_name(n.as_ref()))
        .any(|n| !n.is_empty() && left.contains(&n))
}
