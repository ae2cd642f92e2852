//! Catalog resolution: mapping free-text names to catalog entries.
//!
//! A naive exact match fails for the majority of real listings, because vendor catalog names are free text with
//! inconsistent edition suffixes. Matching therefore runs as a cascade of tiers, from strictest to loosest, and the
//! strictest tier that produces any candidate wins outright:
//!
//! 1. exact normalized-string equality,
//! 2. full word-set equality (only when the query has at least two words),
//! 3. containment similarity (one normalized name is a substring of the other), scored by length ratio,
//! 4. Jaccard-style word overlap, requiring at least two shared words.
//!
//! Ties within a tier are broken by word-overlap count, then by lowest price, then by shortest label. "Not found" is
//! an ordinary `None`, not an error; the caller decides the fallback policy.

mod editions;
pub mod normalize;

use std::collections::HashSet;

use dgf_common::Money;

pub use editions::{choose_edition, edition_keywords};
use normalize::{normalize, words};

const CONTAINMENT_PROMOTED: f64 = 0.7;
const CONTAINMENT_PARTIAL: f64 = 0.5;
const OVERLAP_PROMOTED: f64 = 0.6;
const OVERLAP_PARTIAL: f64 = 0.4;
const MIN_OVERLAP_WORDS: usize = 2;

/// Match quality tiers, in ascending order of confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    Partial,
    Promoted,
    WordSet,
    Exact,
}

/// One scored candidate. `overlap` is the number of words the query and candidate share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameMatch {
    pub index: usize,
    pub tier: MatchTier,
    pub overlap: usize,
}

/// Scores a single candidate name against the query. Both arguments must already be normalized.
pub fn score(query_norm: &str, candidate_norm: &str) -> Option<(MatchTier, usize)> {
    if query_norm.is_empty() || candidate_norm.is_empty() {
        return None;
    }
    let query_words: HashSet<&str> = words(query_norm).into_iter().collect();
    let candidate_words: HashSet<&str> = words(candidate_norm).into_iter().collect();
    let overlap = query_words.intersection(&candidate_words).count();

    if query_norm == candidate_norm {
        return Some((MatchTier::Exact, overlap));
    }
    if query_words.len() >= 2 && query_words == candidate_words {
        return Some((MatchTier::WordSet, overlap));
    }
    if query_norm.contains(candidate_norm) || candidate_norm.contains(query_norm) {
        let shorter = query_norm.len().min(candidate_norm.len()) as f64;
        let longer = query_norm.len().max(candidate_norm.len()) as f64;
        let ratio = shorter / longer;
        if ratio >= CONTAINMENT_PROMOTED {
            return Some((MatchTier::Promoted, overlap));
        }
        if ratio >= CONTAINMENT_PARTIAL {
            return Some((MatchTier::Partial, overlap));
        }
    }
    if overlap >= MIN_OVERLAP_WORDS {
        let union = query_words.union(&candidate_words).count();
        let ratio = overlap as f64 / union as f64;
        if ratio >= OVERLAP_PROMOTED {
            return Some((MatchTier::Promoted, overlap));
        }
        if ratio >= OVERLAP_PARTIAL {
            return Some((MatchTier::Partial, overlap));
        }
    }
    None
}

/// Finds the best candidate for `query` among `(name, price)` pairs. Prices only participate in tie-breaking;
/// candidates without a known price lose price ties.
pub fn best_match(query: &str, candidates: &[(&str, Option<Money>)]) -> Option<NameMatch> {
    let query_norm = normalize(query);
    let mut scored: Vec<(NameMatch, i64, usize)> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, (name, price))| {
            let name_norm = normalize(name);
            score(&query_norm, &name_norm).map(|(tier, overlap)| {
                let price_key = price.map(|p| p.value()).unwrap_or(i64::MAX);
                (NameMatch { index, tier, overlap }, price_key, name_norm.len())
            })
        })
        .collect();
    scored.sort_by(|(a, a_price, a_len), (b, b_price, b_len)| {
        b.tier
            .cmp(&a.tier)
            .then(b.overlap.cmp(&a.overlap))
            .then(a_price.cmp(b_price))
            .then(a_len.cmp(b_len))
    });
    scored.into_iter().map(|(m, _, _)| m).next()
}

/// Finds the best-matching item by name. The common entry point for game summaries, mobile games and positions.
pub fn find_by_name<'a, T>(
    query: &str,
    items: &'a [T],
    name_of: impl Fn(&T) -> &str,
    price_of: impl Fn(&T) -> Option<Money>,
) -> Option<&'a T> {
    let candidates: Vec<(&str, Option<Money>)> = items.iter().map(|i| (name_of(i), price_of(i))).collect();
    best_match(query, &candidates).map(|m| &items[m.index])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exact_beats_any_similarity_match() {
        let candidates =
            vec![("Elden Ring Deluxe Edition", Some(Money::from_units(10))), ("Elden Ring", Some(Money::from_units(999)))];
        let m = best_match("elden ring", &candidates).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.tier, MatchTier::Exact);
    }

    #[test]
    fn word_set_equality_needs_two_words() {
        // Same word set, different order.
        let m = best_match("ring elden", &[("Elden Ring", None)]).unwrap();
        assert_eq!(m.tier, MatchTier::WordSet);
        // One-word queries cannot match on word sets, but containment still applies.
        let m = best_match("ring", &[("Ринг", None), ("The Ring Online", None)]);
        assert!(m.is_none() || m.unwrap().tier < MatchTier::WordSet);
    }

    #[test]
    fn containment_ratio_thresholds() {
        // "portal" in "portal 2": ratio 6/8 = 0.75 → promoted.
        assert_eq!(score("portal", "portal 2"), Some((MatchTier::Promoted, 1)));
        // "dota" in "dota 2 tools": 4/12 ≈ 0.33 → below partial, and only one shared word → no match.
        assert_eq!(score("dota", "dota 2 tools"), None);
    }

    #[test]
    fn containment_is_tried_before_word_overlap() {
        // Substring relation with ratio 9/14 ≈ 0.64: accepted as a partial containment match, the overlap tier is
        // never consulted.
        assert_eq!(score("half life", "half life alyx"), Some((MatchTier::Partial, 2)));
    }

    #[test]
    fn word_overlap_requires_two_shared_words() {
        // Not a substring pair; 3 shared of 4 union → 0.75 → promoted.
        assert_eq!(score("life half 3", "half life 3 remake"), Some((MatchTier::Promoted, 3)));
        // 1 shared word is never enough for the overlap tier.
        assert_eq!(score("portal knights", "knights arena offline"), None);
    }

    #[test]
    fn ties_break_on_overlap_then_price_then_length() {
        // Both candidates contain the query with identical ratios; the cheaper one wins.
        let candidates = vec![("Stray Souls 12", Some(Money::from_units(30))), ("12 Stray Souls", Some(Money::from_units(20)))];
        let m = best_match("stray souls", &candidates).unwrap();
        assert_eq!(m.index, 1);
    }

    #[test]
    fn no_candidate_is_a_value_not_a_panic() {
        assert!(best_match("completely unrelated", &[("Elden Ring", None)]).is_none());
        assert!(best_match("", &[("Elden Ring", None)]).is_none());
    }
}
