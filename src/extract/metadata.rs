//! Default metadata extractor

use super::{DocumentMetadata, ExtractionError, MetadataExtractor};
use crate::family::TITLE_PREFIXES;
use crate::sites::clean_text;
use regex::Regex;
use std::sync::LazyLock;

/// How far into the text category and owner are searched
const SCAN_CHARS: usize = 2000;
const MAX_TITLE_CHARS: usize = 200;

static RE_OWNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:Ministry|Department|Directorate|Office)\s+of\s+(?:the\s+)?[A-Z][A-Za-z&,\- ]{2,80}")
        .unwrap()
});

/// Pulls title, category, and owner from plain text with fixed heuristics
///
/// - title: first line with at least three words, else the file name stem
/// - category: first title-prefix word appearing in the opening text
/// - owner: first "Ministry/Department of ..." phrase
#[derive(Debug, Clone, Default)]
pub struct HeuristicMetadataExtractor;

impl HeuristicMetadataExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn head(text: &str) -> &str {
    match text.char_indices().nth(SCAN_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn title_line(text: &str) -> Option<String> {
    text.lines()
        .map(clean_text)
        .find(|line| {
            line.split(' ').filter(|w| w.chars().any(char::is_alphabetic)).count() >= 3
                && line.chars().count() <= MAX_TITLE_CHARS
        })
}

fn category(text: &str) -> Option<String> {
    let lower = head(text).to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .iter()
        .find(|w| TITLE_PREFIXES.contains(*w))
        .map(|w| w.to_string())
}

fn owner(text: &str) -> Option<String> {
    head(text)
        .lines()
        .find_map(|line| RE_OWNER.find(line))
        .map(|m| clean_text(m.as_str().trim_end_matches([',', '-', ' '])))
}

impl MetadataExtractor for HeuristicMetadataExtractor {
    fn extract(
        &self,
        text: &str,
        file_name: Option<&str>,
    ) -> Result<DocumentMetadata, ExtractionError> {
        let title = title_line(text).or_else(|| {
            file_name
                .map(|name| name.rsplit_once('.').map_or(name, |(stem, _)| stem))
                .map(|stem| clean_text(&stem.replace(['-', '_'], " ")))
                .filter(|stem| !stem.is_empty())
        });

        Ok(DocumentMetadata {
            title,
            category: category(text),
            owner: owner(text),
        })
    }
}
