/// Similarity measures used by the ranker and the quorum matcher.
use std::collections::HashSet;

use super::normalize::normalize_name;

// ── Constants ────────────────────────────────────────────────────────

/// Added when every target word appears in the candidate name.
pub const FULL_MATCH_BONUS: i32 = 2;

/// Edit-similarity ratio above which two normalized names are the same name.
pub const NAME_MATCH_THRESHOLD: f64 = 0.8;

// ── Word-overlap score ───────────────────────────────────────────────

fn word_set<'a>(parts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    parts
        .into_iter()
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect()
}

/// Score a free-form candidate name against structured target name parts.
///
/// `overlap + bonus - extra`, where `bonus` is [`FULL_MATCH_BONUS`] when the
/// candidate contains every target word and `extra` counts candidate words
/// beyond the target's word count. Empty candidate or empty target scores 0.
pub fn score<S: AsRef<str>>(candidate_name: &str, target_parts: &[S]) -> i32 {
    let candidate_words = word_set([candidate_name]);
    let target_words = word_set(target_parts.iter().map(AsRef::as_ref));
    if candidate_words.is_empty() || target_words.is_empty() {
        return 0;
    }

    let overlap = candidate_words.intersection(&target_words).count() as i32;
    let bonus = if target_words.is_subset(&candidate_words) {
        FULL_MATCH_BONUS
    } else {
        0
    };
    let extra = (candidate_words.len() as i32 - target_words.len() as i32).max(0);

    overlap + bonus - extra
}

// ── Edit-similarity ratio ────────────────────────────────────────────

/// Longest common block in `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, len)`; among equally long blocks the earliest in `a`,
/// then in `b`, wins.
fn longest_block(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let width = bhi - blo + 1;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width];

    for i in alo..ahi {
        let mut row = vec![0usize; width];
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = prev[j - blo] + 1;
                row[j - blo + 1] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = row;
    }

    best
}

/// Total length of the recursive longest-matching-blocks decomposition.
fn matched_len(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![((0, a.len()), (0, b.len()))];

    while let Some(((alo, ahi), (blo, bhi))) = pending.pop() {
        let (i, j, k) = longest_block(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            pending.push(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            pending.push(((i + k, ahi), (j + k, bhi)));
        }
    }

    total
}

/// Matching-blocks similarity ratio `2M / (|a| + |b|)` in `[0, 1]`.
///
/// Two empty strings are identical (ratio 1.0).
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_len(&a, &b) as f64 / total as f64
}

/// Whether two personal names refer to the same name after normalization.
pub fn names_match(a: &str, b: &str) -> bool {
    sequence_ratio(&normalize_name(a), &normalize_name(b)) > NAME_MATCH_THRESHOLD
}
