/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Coerce a marketplace listing id into its numeric part.
///
/// Listing ids are opaque strings, but some endpoints want the numeric prefix only, e.g. `"123-4"` refers to
/// listing `123`. Returns `None` when there is no leading numeric component at all.
pub fn coerce_listing_id(id: &str) -> Option<i64> {
    let digits: String = id.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("yes".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(None, true));
        assert!(parse_boolean_flag(Some("garbage".into()), true));
    }

    #[test]
    fn listing_id_coercion() {
        assert_eq!(coerce_listing_id("123-4"), Some(123));
        assert_eq!(coerce_listing_id("987654"), Some(987654));
        assert_eq!(coerce_listing_id(" 42abc"), Some(42));
        assert_eq!(coerce_listing_id("abc"), None);
        assert_eq!(coerce_listing_id(""), None);
    }
}
