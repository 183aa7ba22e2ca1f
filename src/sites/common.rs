//! Shared helpers for scraper variants
//!
//! Title derivation, text cleanup, rule-driven link selection, and pagination
//! heuristics live here so variants compose them instead of inheriting.

use super::{DiscoveredDocument, FileType};
use crate::url::{file_name, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Link labels that say nothing about the document
const GENERIC_LABELS: &[&str] = &[
    "download",
    "view",
    "click here",
    "here",
    "pdf",
    "open",
    "read more",
    "more",
    "details",
    "link",
    "file",
    "attachment",
];

/// Link texts marking a "next page" control
const NEXT_MARKERS: &[&str] = &["next", "next page", "older", "older posts", "older entries"];

/// Symbol-only next controls
const NEXT_SYMBOLS: &[&str] = &["»", "›", ">", ">>", "→"];

/// Query keys carrying a page number
const PAGE_PARAMS: &[&str] = &["page", "paged", "pg", "p"];

const MAX_CONTEXT_CHARS: usize = 200;
const MAX_PARENT_TITLE_CHARS: usize = 300;

/// Collapses all whitespace runs to single spaces and trims
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Human-readable title from a URL's file name (`fee-revision_2024.pdf` -> `fee revision 2024`)
pub fn title_from_file_name(url: &Url) -> Option<String> {
    let name = file_name(url)?;
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => name,
    };
    let spaced: String = stem
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '+' | '.') { ' ' } else { c })
        .collect();
    let title = clean_text(&spaced);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

fn element_text(el: &ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<String>())
}

/// True when text could serve as a document title
pub(crate) fn is_meaningful(text: &str) -> bool {
    let lower = text.to_lowercase();
    if text.chars().count() < 3 || GENERIC_LABELS.contains(&lower.as_str()) {
        return false;
    }
    // Dates, serial numbers, and file sizes carry no title
    text.chars().any(|c| c.is_alphabetic())
        && !lower.ends_with(" kb")
        && !lower.ends_with(" mb")
}

pub(crate) fn link_text(el: &ElementRef<'_>) -> Option<String> {
    Some(element_text(el)).filter(|t| is_meaningful(t))
}

pub(crate) fn title_attribute(el: &ElementRef<'_>) -> Option<String> {
    el.value()
        .attr("title")
        .map(clean_text)
        .filter(|t| is_meaningful(t))
}

fn enclosing<'a>(el: &ElementRef<'a>, names: &[&str]) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| names.contains(&e.value().name()))
}

/// Longest meaningful text among the other cells of the link's table row
pub(crate) fn sibling_cell_text(el: &ElementRef<'_>) -> Option<String> {
    let cell = enclosing(el, &["td", "th"])?;
    let row = cell.parent().and_then(ElementRef::wrap)?;

    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th") && c.id() != cell.id())
        .map(|c| element_text(&c))
        .filter(|t| is_meaningful(t))
        .max_by_key(|t| t.chars().count())
}

/// Text of the nearest container holding more than the link itself
pub(crate) fn parent_text(el: &ElementRef<'_>) -> Option<String> {
    let own = element_text(el);

    for ancestor in el.ancestors().filter_map(ElementRef::wrap) {
        if matches!(ancestor.value().name(), "body" | "html" | "table" | "tbody" | "ul" | "ol") {
            break;
        }
        let text = element_text(&ancestor);
        let remainder = clean_text(&text.replacen(&own, " ", 1));
        if is_meaningful(&remainder) {
            if remainder.chars().count() > MAX_PARENT_TITLE_CHARS {
                return None;
            }
            return Some(remainder);
        }
    }
    None
}

/// Text of the enclosing row, list item, or paragraph
pub(crate) fn row_context(el: &ElementRef<'_>) -> Option<String> {
    let container = enclosing(el, &["tr", "li", "p", "article"])?;
    Some(truncate_chars(&element_text(&container), MAX_CONTEXT_CHARS)).filter(|t| !t.is_empty())
}

/// Title fallback chain: link text, title attribute, sibling cell, parent
/// container text, then the file name
pub(crate) fn derive_title(el: &ElementRef<'_>, url: &Url) -> String {
    link_text(el)
        .or_else(|| title_attribute(el))
        .or_else(|| sibling_cell_text(el))
        .or_else(|| parent_text(el))
        .or_else(|| title_from_file_name(url))
        .unwrap_or_else(|| url.to_string())
}

/// Applies selection rules in order and returns the matches of the first rule
/// yielding any document link
pub(crate) fn select_documents<F>(
    doc: &Html,
    page_url: &Url,
    rules: &[&str],
    title: F,
) -> Vec<DiscoveredDocument>
where
    F: Fn(&ElementRef<'_>, &Url) -> String,
{
    for rule in rules {
        let selector = match Selector::parse(rule) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!(selector = %rule, "Skipping unusable selector: {:?}", e);
                continue;
            }
        };

        let mut seen = HashSet::new();
        let mut found = Vec::new();

        for el in doc.select(&selector) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let Some(mut url) = resolve_link(href, page_url) else {
                continue;
            };
            url.set_fragment(None);

            let file_type = FileType::from_url(&url);
            if !file_type.is_document() || !seen.insert(url.to_string()) {
                continue;
            }

            found.push(DiscoveredDocument {
                title: title(&el, &url),
                context: row_context(&el),
                url: url.to_string(),
                file_type,
            });
        }

        if !found.is_empty() {
            tracing::debug!(page = %page_url, rule = %rule, count = found.len(), "Documents matched");
            return found;
        }
    }

    Vec::new()
}

/// Page number encoded in a URL as `?page=N` or `/page/N/`
pub(crate) fn page_number(url: &Url) -> Option<u32> {
    let from_query = url
        .query_pairs()
        .find(|(key, _)| PAGE_PARAMS.contains(&&**key))
        .and_then(|(_, value)| value.parse().ok());
    if from_query.is_some() {
        return from_query;
    }

    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    segments
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("page"))
        .and_then(|pair| pair[1].parse().ok())
}

fn is_next_marker(el: &ElementRef<'_>) -> bool {
    let label = el
        .value()
        .attr("aria-label")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(el));
    let lower = label.to_lowercase();
    if NEXT_SYMBOLS.contains(&lower.trim()) {
        return true;
    }
    let words: String = lower
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    NEXT_MARKERS.contains(&clean_text(&words).as_str())
}

/// Pagination heuristics shared by all variants
///
/// Explicit next markers (`rel=next`, `.next`, "Next"/"»" link text) come
/// first, then numbered links (`page=N`, `/page/N/`) beyond the current page
/// in ascending order. Only same-host, non-document links are kept; the
/// result is capped at `max`.
pub(crate) fn discover_pagination(
    doc: &Html,
    page_url: &Url,
    extra_marker_selectors: &[&str],
    max: usize,
) -> Vec<String> {
    let current = page_number(page_url).unwrap_or(1);
    let mut candidates: Vec<Url> = Vec::new();

    let marker_selectors = ["link[rel~='next'][href]", "a[rel~='next'][href]", ".next a[href]", "a.next[href]"];
    for rule in marker_selectors.iter().chain(extra_marker_selectors) {
        let Ok(selector) = Selector::parse(rule) else {
            tracing::warn!(selector = %rule, "Skipping unusable pagination selector");
            continue;
        };
        for el in doc.select(&selector) {
            if let Some(url) = el.value().attr("href").and_then(|h| resolve_link(h, page_url)) {
                candidates.push(url);
            }
        }
    }

    let mut numbered: Vec<(u32, Url)> = Vec::new();
    if let Ok(anchors) = Selector::parse("a[href]") {
        for el in doc.select(&anchors) {
            let Some(url) = el.value().attr("href").and_then(|h| resolve_link(h, page_url)) else {
                continue;
            };
            if is_next_marker(&el) {
                candidates.push(url);
            } else if let Some(n) = page_number(&url).filter(|n| *n > current) {
                numbered.push((n, url));
            }
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    candidates.extend(numbered.into_iter().map(|(_, url)| url));

    let mut current_url = page_url.clone();
    current_url.set_fragment(None);

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|mut url| {
            url.set_fragment(None);
            let same_host = url.host_str() == page_url.host_str();
            let is_listing = !FileType::from_url(&url).is_document();
            let not_backwards = page_number(&url).map_or(true, |n| n > current);
            (same_host && is_listing && not_backwards && url != current_url).then_some(url)
        })
        .map(|url| url.to_string())
        .filter(|url| seen.insert(url.clone()))
        .take(max)
        .collect()
}
