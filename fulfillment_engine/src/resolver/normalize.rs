//! Free-text name normalization.
//!
//! Vendor catalog names and marketplace lot descriptions are free text: inconsistent casing, trademark glyphs,
//! typographic punctuation, numbering prefixes. Both sides of every comparison go through [`normalize`] first, and the
//! result is idempotent: normalizing a normalized string is a no-op.

/// Normalizes a game or lot name for matching.
///
/// Case-folds, drops trademark glyphs, folds typographic punctuation to ASCII, strips a leading ordinal prefix
/// ("1." / "2)"), collapses remaining punctuation to single separators and trims the result.
pub fn normalize(name: &str) -> String {
    let folded: String = name.to_lowercase().chars().filter_map(fold_char).collect();
    let stripped = strip_ordinal_prefix(&folded);
    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;
    for c in stripped.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

/// The words of an already-normalized name.
pub fn words(normalized: &str) -> Vec<&str> {
    normalized.split(' ').filter(|w| !w.is_empty()).collect()
}

/// A small explicit fold table instead of full Unicode compatibility decomposition: these are the glyphs that actually
/// occur in vendor catalog names.
fn fold_char(c: char) -> Option<char> {
    match c {
        '™' | '®' | '©' | '\u{fe0f}' => None,
        '’' | '‘' | '`' => Some('\''),
        '“' | '”' | '«' | '»' => Some('"'),
        '–' | '—' | '‒' | '−' => Some('-'),
        '\u{a0}' => Some(' '),
        other => Some(other),
    }
}

/// Strips a leading "1." / "23)" style ordinal, which some operators use to order their lot lists.
fn strip_ordinal_prefix(s: &str) -> &str {
    let trimmed = s.trim_start();
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return trimmed;
    }
    let rest = &trimmed[digits..];
    match rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        Some(r) => r.trim_start(),
        None => trimmed,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_glyphs_and_punctuation() {
        assert_eq!(normalize("Cyberpunk 2077™: Ultimate Edition"), "cyberpunk 2077 ultimate edition");
        assert_eq!(normalize("  S.T.A.L.K.E.R. 2 — Heart of Chornobyl®"), "s t a l k e r 2 heart of chornobyl");
        assert_eq!(normalize("Assassin’s Creed"), "assassin s creed");
    }

    #[test]
    fn strips_leading_ordinals_only() {
        assert_eq!(normalize("1. Elden Ring"), "elden ring");
        assert_eq!(normalize("12) Elden Ring"), "elden ring");
        // A number that is part of the name stays.
        assert_eq!(normalize("7 Days to Die"), "7 days to die");
        assert_eq!(normalize("2077"), "2077");
    }

    #[test]
    fn idempotent() {
        for s in [
            "Cyberpunk 2077™: Ultimate Edition",
            "1. Elden Ring",
            "ДОТА 2",
            "A  lot   of---whitespace!!!",
            "",
            "İstanbul",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "normalize is not idempotent for {s:?}");
        }
    }

    #[test]
    fn word_extraction() {
        assert_eq!(words("elden ring"), vec!["elden", "ring"]);
        assert!(words("").is_empty());
    }
}
