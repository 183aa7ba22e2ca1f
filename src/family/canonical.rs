use regex::Regex;
use std::sync::LazyLock;

/// Leading words stripped from titles before family matching
pub const TITLE_PREFIXES: &[&str] = &[
    "notification",
    "circular",
    "order",
    "guidelines",
    "policy",
    "scheme",
    "amendment",
    "corrigendum",
];

const MAX_CANONICAL_CHARS: usize = 500;

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: String) -> String {
    match text.char_indices().nth(MAX_CANONICAL_CHARS) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text,
    }
}

/// Strips one leading prefix word (with trailing punctuation), if present
fn strip_prefix(text: &str) -> Option<&str> {
    TITLE_PREFIXES.iter().find_map(|prefix| {
        let rest = text.strip_prefix(prefix)?;
        if rest.chars().next().is_some_and(char::is_alphanumeric) {
            return None;
        }
        Some(rest.trim_start_matches(|c: char| !c.is_alphanumeric()))
    })
}

/// Title form used to match documents into families
///
/// Lowercases, removes four-digit year tokens, collapses whitespace, strips
/// leading prefix words ("circular", "order", ...) repeatedly along with
/// surrounding punctuation, and truncates to 500 characters. A title reduced to nothing falls back to its
/// lowercased, whitespace-collapsed original.
///
/// # Example
///
/// ```
/// use docket::family::canonical_title;
///
/// assert_eq!(
///     canonical_title("Circular: Amendment to Licence Fee Rules 2024"),
///     "to licence fee rules"
/// );
/// assert_eq!(canonical_title("Notification 2024"), "notification 2024");
/// ```
pub fn canonical_title(title: &str) -> String {
    let original = collapse(&title.to_lowercase());
    let without_years = collapse(&RE_YEAR.replace_all(&original, " "));

    let mut text = without_years.as_str();
    while let Some(rest) = strip_prefix(text) {
        text = rest;
    }
    let canonical = text.trim_matches(|c: char| !c.is_alphanumeric()).to_string();

    if canonical.is_empty() {
        truncate(original)
    } else {
        truncate(canonical)
    }
}
