//! Fuzzy string scoring.
//!
//! All scorers return a similarity in `[0, 100]` built on the Indel
//! distance (insertions and deletions only), so `ratio` is
//! `200 · LCS(a, b) / (|a| + |b|)`.
//!
//! | Scorer | Idea |
//! |--------|------|
//! | [`ratio`] | Whole-string similarity |
//! | [`partial_ratio`] | Best window of the longer string against the shorter |
//! | [`token_sort_ratio`] | Ratio after sorting whitespace tokens |
//! | [`token_set_ratio`] | Ratio over shared and differing token sets |
//! | [`partial_token_sort_ratio`] / [`partial_token_set_ratio`] | Partial variants of the above |
//! | [`wratio`] | Weighted combination, picked by length ratio |
//!
//! No preprocessing is applied: scoring is case-sensitive and tokens are
//! split on whitespace. Use [`default_process`] first for normalised
//! scoring.
//!
//! [`rank`] scores one query against a candidate list and returns the
//! candidates best-first. It is the ranking call the aggregator uses.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

/// Relevance floor below which a candidate is conceptually irrelevant.
/// Not applied unless a caller opts in through `score_floor`.
pub const DEFAULT_SCORE_FLOOR: f64 = 50.0;

const UNBASE_SCALE: f64 = 0.95;

/// One scored candidate from [`rank`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChoice {
    /// The candidate text as given.
    pub text: String,
    /// Weighted-ratio similarity in `[0, 100]`.
    pub score: f64,
    /// Position of the candidate in the input slice.
    pub index: usize,
}

/// Score `query` against every choice with [`wratio`] and return them
/// best-first, truncated to `limit` when given.
///
/// Equal scores keep input order. Empty `choices` yields an empty result.
pub fn rank<S: AsRef<str>>(query: &str, choices: &[S], limit: Option<usize>) -> Vec<ScoredChoice> {
    let mut scored: Vec<ScoredChoice> = choices
        .iter()
        .enumerate()
        .map(|(index, choice)| ScoredChoice {
            text: choice.as_ref().to_string(),
            score: wratio(query, choice.as_ref()),
            index,
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    if let Some(limit) = limit {
        scored.truncate(limit);
    }
    scored
}

/// Lowercase, replace non-alphanumerics with spaces, and trim.
pub fn default_process(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Weighted ratio.
///
/// - Length ratio below 1.5: best of `ratio` and the token ratios × 0.95.
/// - Otherwise partial scorers take over, scaled by 0.9 (0.6 once one
///   string is 8× longer), with partial token ratios further × 0.95.
///
/// Returns 0 when either string is empty.
pub fn wratio(s1: &str, s2: &str) -> f64 {
    if s1.is_empty() || s2.is_empty() {
        return 0.0;
    }

    let len1 = s1.chars().count() as f64;
    let len2 = s2.chars().count() as f64;
    let len_ratio = if len1 > len2 { len1 / len2 } else { len2 / len1 };

    let mut end_ratio = ratio(s1, s2);

    if len_ratio < 1.5 {
        let token = token_sort_ratio(s1, s2).max(token_set_ratio(s1, s2));
        return end_ratio.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };

    end_ratio = end_ratio.max(partial_ratio(s1, s2) * partial_scale);
    end_ratio.max(partial_token_ratio(s1, s2) * UNBASE_SCALE * partial_scale)
}

/// Indel similarity of the two whole strings.
pub fn ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    indel_ratio(&a, &b)
}

/// Best [`ratio`] between the shorter string and any same-length window of
/// the longer one, including the windows overhanging either end.
pub fn partial_ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    partial_ratio_chars(&a, &b)
}

/// [`ratio`] after sorting the whitespace tokens of each string.
pub fn token_sort_ratio(s1: &str, s2: &str) -> f64 {
    ratio(&sorted_tokens(s1), &sorted_tokens(s2))
}

/// [`partial_ratio`] after sorting the whitespace tokens of each string.
pub fn partial_token_sort_ratio(s1: &str, s2: &str) -> f64 {
    partial_ratio(&sorted_tokens(s1), &sorted_tokens(s2))
}

/// Token-set similarity: compares the shared tokens plus each side's
/// remainder. 100 when one token set contains the other.
pub fn token_set_ratio(s1: &str, s2: &str) -> f64 {
    let a: BTreeSet<&str> = s1.split_whitespace().collect();
    let b: BTreeSet<&str> = s2.split_whitespace().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = a.intersection(&b).copied().collect();
    let diff_ab: Vec<&str> = a.difference(&b).copied().collect();
    let diff_ba: Vec<&str> = b.difference(&a).copied().collect();

    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let diff_ab_joined: Vec<char> = diff_ab.join(" ").chars().collect();
    let diff_ba_joined: Vec<char> = diff_ba.join(" ").chars().collect();
    let ab_len = diff_ab_joined.len();
    let ba_len = diff_ba_joined.len();
    let sect_len = sect.join(" ").chars().count();

    let sep = usize::from(sect_len != 0);
    let sect_ab_len = sect_len + sep + ab_len;
    let sect_ba_len = sect_len + sep + ba_len;

    let dist = indel_distance(&diff_ab_joined, &diff_ba_joined);
    let result = norm_distance(dist, sect_ab_len + sect_ba_len);

    if sect_len == 0 {
        return result;
    }

    // sect vs sect+diff differ only by the appended remainder
    let sect_ab_ratio = norm_distance(sep + ab_len, sect_len + sect_ab_len);
    let sect_ba_ratio = norm_distance(sep + ba_len, sect_len + sect_ba_len);

    result.max(sect_ab_ratio).max(sect_ba_ratio)
}

/// Partial token-set similarity: 100 on any shared token, otherwise the
/// partial ratio of the sorted token differences.
pub fn partial_token_set_ratio(s1: &str, s2: &str) -> f64 {
    let a: BTreeSet<&str> = s1.split_whitespace().collect();
    let b: BTreeSet<&str> = s2.split_whitespace().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.intersection(&b).next().is_some() {
        return 100.0;
    }
    let diff_ab: Vec<&str> = a.difference(&b).copied().collect();
    let diff_ba: Vec<&str> = b.difference(&a).copied().collect();
    partial_ratio(&diff_ab.join(" "), &diff_ba.join(" "))
}

/// Max of the partial token sort and partial token set ratios, sharing the
/// tokenisation.
fn partial_token_ratio(s1: &str, s2: &str) -> f64 {
    let tokens_a: Vec<&str> = s1.split_whitespace().collect();
    let tokens_b: Vec<&str> = s2.split_whitespace().collect();
    let set_a: BTreeSet<&str> = tokens_a.iter().copied().collect();
    let set_b: BTreeSet<&str> = tokens_b.iter().copied().collect();

    if set_a.intersection(&set_b).next().is_some() {
        return 100.0;
    }

    let result = partial_token_sort_ratio(s1, s2);

    // without shared tokens the differences are the full sets; if those
    // had no duplicates the set variant repeats the sort variant
    if tokens_a.len() == set_a.len() && tokens_b.len() == set_b.len() {
        return result;
    }

    result.max(partial_token_set_ratio(s1, s2))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn partial_ratio_chars(s1: &[char], s2: &[char]) -> f64 {
    let (shorter, longer) = if s1.len() <= s2.len() { (s1, s2) } else { (s2, s1) };

    if shorter.is_empty() {
        return if longer.is_empty() { 100.0 } else { 0.0 };
    }

    let best = partial_windows(shorter, longer);
    if shorter.len() == longer.len() && best < 100.0 {
        return best.max(partial_windows(longer, shorter));
    }
    best
}

/// Slide `needle` over `hay` (`needle.len() <= hay.len()`). A window is
/// only scored when its last (or, for the tail, first) character occurs
/// in the needle.
fn partial_windows(needle: &[char], hay: &[char]) -> f64 {
    let n = needle.len();
    let h = hay.len();
    let in_needle = |c: &char| needle.contains(c);
    let mut best = 0.0_f64;

    for i in 1..n {
        if in_needle(&hay[i - 1]) {
            best = best.max(indel_ratio(needle, &hay[..i]));
            if best >= 100.0 {
                return 100.0;
            }
        }
    }

    for i in 0..=(h - n) {
        if in_needle(&hay[i + n - 1]) {
            best = best.max(indel_ratio(needle, &hay[i..i + n]));
            if best >= 100.0 {
                return 100.0;
            }
        }
    }

    for i in (h - n + 1)..h {
        if in_needle(&hay[i]) {
            best = best.max(indel_ratio(needle, &hay[i..]));
            if best >= 100.0 {
                return 100.0;
            }
        }
    }

    best
}

fn indel_ratio(a: &[char], b: &[char]) -> f64 {
    norm_distance(indel_distance(a, b), a.len() + b.len())
}

fn indel_distance(a: &[char], b: &[char]) -> usize {
    a.len() + b.len() - 2 * lcs_len(a, b)
}

fn norm_distance(dist: usize, lensum: usize) -> f64 {
    if lensum == 0 {
        100.0
    } else {
        100.0 - 100.0 * dist as f64 / lensum as f64
    }
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}
