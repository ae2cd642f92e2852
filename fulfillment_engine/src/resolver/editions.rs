use dgf_common::Money;

use super::{best_match, normalize::normalize};
use crate::data_types::Edition;

/// Edition keyword groups. The first entry of each group is the canonical keyword; the rest are synonyms that occur
/// in real catalog labels. All entries are pre-normalized.
const EDITION_KEYWORDS: &[&[&str]] = &[
    &["deluxe"],
    &["ultimate"],
    &["goty", "game of the year", "g o t y"],
    &["premium"],
    &["gold"],
    &["complete"],
    &["definitive"],
    &["collector s", "collector", "collectors"],
    &["anniversary"],
    &["legendary"],
];

/// Extracts the canonical edition keywords present in a lot's own name.
///
/// These keywords drive package selection: a lot called "... Ultimate Edition (KZ)" must buy the Ultimate package
/// even when another edition's label is a closer overall name match.
pub fn edition_keywords(lot_name: &str) -> Vec<&'static str> {
    let norm = normalize(lot_name);
    EDITION_KEYWORDS
        .iter()
        .filter(|group| group.iter().any(|kw| contains_phrase(&norm, kw)))
        .map(|group| group[0])
        .collect()
}

/// Picks the edition to purchase for the given lot and region.
///
/// Selection order:
/// 1. editions whose label carries an edition keyword extracted from the lot name (most keyword hits win, then
///    cheapest),
/// 2. plain name-similarity between the lot name and the edition labels,
/// 3. the cheapest edition labelled "standard" that carries no premium-tier keyword,
/// 4. the globally cheapest edition.
pub fn choose_edition<'a>(lot_name: &str, editions: &'a [Edition], region: &str) -> Option<&'a Edition> {
    if editions.is_empty() {
        return None;
    }
    let keywords = edition_keywords(lot_name);
    if !keywords.is_empty() {
        let mut hits: Vec<(&Edition, usize)> = editions
            .iter()
            .map(|e| {
                let label = normalize(&e.label);
                let count = keywords.iter().filter(|kw| contains_phrase(&label, kw)).count();
                (e, count)
            })
            .filter(|(_, count)| *count > 0)
            .collect();
        hits.sort_by(|(a, a_hits), (b, b_hits)| {
            b_hits.cmp(a_hits).then(ordering_price(a, region).cmp(&ordering_price(b, region)))
        });
        if let Some((edition, _)) = hits.first() {
            return Some(edition);
        }
    }

    let candidates: Vec<(&str, Option<Money>)> =
        editions.iter().map(|e| (e.label.as_str(), e.prices.get(region).copied().or_else(|| e.min_price()))).collect();
    if let Some(m) = best_match(lot_name, &candidates) {
        return Some(&editions[m.index]);
    }

    let standard = editions
        .iter()
        .filter(|e| {
            let label = normalize(&e.label);
            contains_phrase(&label, "standard") && edition_keywords(&e.label).is_empty()
        })
        .min_by_key(|e| ordering_price(e, region));
    if standard.is_some() {
        return standard;
    }

    editions.iter().min_by_key(|e| ordering_price(e, region))
}

/// The price used for ordering edition candidates: the region price when present, any price otherwise.
fn ordering_price(edition: &Edition, region: &str) -> i64 {
    edition
        .prices
        .get(region)
        .copied()
        .or_else(|| edition.min_price())
        .map(|p| p.value())
        .unwrap_or(i64::MAX)
}

/// Whole-phrase containment on normalized strings: "gold" must not match inside "golden".
fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    let padded = format!(" {normalized} ");
    padded.contains(&format!(" {phrase} "))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn edition(label: &str, region: &str, price: i64) -> Edition {
        let mut prices = HashMap::new();
        prices.insert(region.to_string(), Money::from_units(price));
        Edition { package_id: format!("pkg-{label}"), label: label.to_string(), currency: "USD".to_string(), prices }
    }

    #[test]
    fn keyword_extraction() {
        assert_eq!(edition_keywords("Cyberpunk 2077 Ultimate Edition (KZ)"), vec!["ultimate"]);
        assert_eq!(edition_keywords("The Witcher 3: Game of the Year"), vec!["goty"]);
        assert_eq!(edition_keywords("Fallout 4 G.O.T.Y."), vec!["goty"]);
        assert!(edition_keywords("Elden Ring (RU)").is_empty());
        // "Goldberg" must not be read as a gold edition.
        assert!(edition_keywords("Goldberg Simulator").is_empty());
    }

    #[test]
    fn keyword_hit_outranks_cheaper_editions() {
        let editions = vec![edition("Standard", "KZ", 40), edition("Ultimate Edition", "KZ", 60)];
        let chosen = choose_edition("Cyberpunk 2077 Ultimate Edition (KZ)", &editions, "KZ").unwrap();
        assert_eq!(chosen.label, "Ultimate Edition");
        assert_eq!(chosen.prices["KZ"], Money::from_units(60));
    }

    #[test]
    fn standard_fallback_excludes_premium_labels() {
        let editions = vec![
            edition("Deluxe Standard Bundle", "RU", 10),
            edition("Standard Edition", "RU", 25),
            edition("Mystery Pack", "RU", 5),
        ];
        // No keywords in the lot name and no label similarity: falls back to the plain standard edition even though
        // cheaper editions exist.
        let chosen = choose_edition("Some Unrelated Game (RU)", &editions, "RU").unwrap();
        assert_eq!(chosen.label, "Standard Edition");
    }

    #[test]
    fn cheapest_fallback_when_nothing_is_standard() {
        let editions = vec![edition("Pack A", "RU", 30), edition("Pack B", "RU", 12)];
        let chosen = choose_edition("Another Game (RU)", &editions, "RU").unwrap();
        assert_eq!(chosen.label, "Pack B");
    }

    #[test]
    fn empty_editions_is_none() {
        assert!(choose_edition("Anything", &[], "RU").is_none());
    }
}
