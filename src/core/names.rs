/// First character upper-cased, the rest lower-cased.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `"reika frost"` -> `"Reika Frost"`; runs of whitespace collapse to one space.
pub fn title_case_words(name: &str) -> String {
    name.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"haruto_frost"` -> `"Haruto Frost"`.
pub fn snake_to_title(id: &str) -> String {
    id.split('_').map(capitalize).collect::<Vec<_>>().join(" ")
}

/// Display name for an identity record: exports sometimes repeat the snake_case id
/// as the name.
pub fn normalize_identity_name(name: &str, id: &str) -> String {
    if name == id && name.contains('_') {
        snake_to_title(name)
    } else {
        name.to_string()
    }
}

/// True when `target` selects the identity `(name, id)`: case-insensitive name
/// match, or the id equals the target lower-cased with spaces as underscores.
pub fn matches_selection(name: &str, id: &str, target: &str) -> bool {
    name.to_lowercase() == target.to_lowercase()
        || id.to_lowercase() == target.to_lowercase().replace(' ', "_")
}

/// Text inside the first pair of parentheses: `"Nexus Enraenra (CEO)"` -> `"CEO"`.
pub fn parenthesized(text: &str) -> Option<&str> {
    if !(text.contains('(') && text.contains(')')) {
        return None;
    }
    let after = text.split('(').nth(1)?;
    after.split(')').next()
}

/// Empty strings become `None`.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_lowercases_tail() {
        assert_eq!(capitalize("reIKA"), "Reika");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("ōkami"), "Ōkami");
    }

    #[test]
    fn test_snake_to_title() {
        assert_eq!(snake_to_title("haruto_frost"), "Haruto Frost");
        assert_eq!(snake_to_title("ren"), "Ren");
    }

    #[test]
    fn test_normalize_identity_name() {
        assert_eq!(normalize_identity_name("kage_ishigawa", "kage_ishigawa"), "Kage Ishigawa");
        assert_eq!(normalize_identity_name("Kage Ishigawa", "kage_ishigawa"), "Kage Ishigawa");
        assert_eq!(normalize_identity_name("solo", "solo"), "solo");
    }

    #[test]
    fn test_matches_selection() {
        assert!(matches_selection("Ren Kael", "ren_kael", "ren kael"));
        assert!(matches_selection("ren_kael", "ren_kael", "Ren Kael"));
        assert!(!matches_selection("Ren Kael", "ren_kael", "Haruto Frost"));
    }

    #[test]
    fn test_parenthesized() {
        assert_eq!(parenthesized("Nexus Enraenra (CEO)"), Some("CEO"));
        assert_eq!(parenthesized("CMM - Iron Sultura (Executor) (K05)"), Some("Executor"));
        assert_eq!(parenthesized("Shadow Core"), None);
        assert_eq!(parenthesized("Broken (paren"), None);
    }

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case_words("  mitsuko   frost "), "Mitsuko Frost");
    }
}
