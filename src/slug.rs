use once_cell::sync::Lazy;
use regex::Regex;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").expect("valid regex"));

/// Lowercases `value`, drops everything but word characters, whitespace and
/// hyphens, then collapses runs of whitespace/hyphens into a single `-`.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let cleaned = NON_WORD.replace_all(&lowered, "");
    let joined = SEPARATORS.replace_all(cleaned.trim(), "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_matches_url_form() {
        assert_eq!(slugify("Mobile app: phase 2"), "mobile-app-phase-2");
        assert_eq!(slugify("  Trailing -- dashes -- "), "trailing-dashes");
        assert_eq!(slugify("Ünïcode & co"), "ünïcode-co");
        assert_eq!(slugify("!!!"), "");
    }
}
