use regex::Regex;
use scraper::{ElementRef, Html, Node};
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Elements whose content never contributes to a fingerprint
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "footer", "template", "svg", "head",
];

/// Class/id tokens marking ads, counters, and pagination widgets
const VOLATILE_TOKENS: &[&str] = &[
    "ad",
    "ads",
    "advert",
    "advertisement",
    "banner",
    "pagination",
    "pager",
    "counter",
    "visitor",
    "visitors",
    "timestamp",
];

/// Query parameters carrying per-session or per-request values
const SESSION_PARAMS: &[&str] = &[
    "sid",
    "sessionid",
    "session_id",
    "jsessionid",
    "phpsessid",
    "aspsessionid",
    "token",
    "csrf",
    "_ts",
    "ts",
    "timestamp",
    "nocache",
    "_",
];

static RE_LAST_UPDATED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:last\s+(?:updated|modified|reviewed)|updated\s+on|page\s+generated(?:\s+in)?|generated\s+on)\b\s*(?:on|at)?\s*:?",
    )
    .unwrap()
});

static RE_VISITORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:visitors?|visits|hits|page\s+views)\b\s*(?:count|counter)?\s*:?\s*[\d,]+")
        .unwrap()
});

static RE_NUMERIC_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}\b").unwrap());

static RE_TEXT_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s+)?(?:\d{1,2}(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?,?\s+\d{4}|(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4})\b",
    )
    .unwrap()
});

static RE_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]\.?m\.?)?(?:\s*(?:ist|utc|gmt|[+-]\d{2}:?\d{2}))?\b")
        .unwrap()
});

fn is_volatile(el: &ElementRef<'_>) -> bool {
    let element = el.value();
    if SKIPPED_ELEMENTS.contains(&element.name()) {
        return true;
    }
    let has_marker = |value: &str| {
        value
            .split(|c: char| !c.is_ascii_alphanumeric())
            .any(|token| VOLATILE_TOKENS.contains(&token.to_ascii_lowercase().as_str()))
    };
    element.id().is_some_and(has_marker) || element.classes().any(has_marker)
}

/// Drops session parameters from a link, keeping everything else
fn stable_link(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or_default();
    // ;jsessionid=... path parameters
    let path_end = without_fragment.find(['?']).unwrap_or(without_fragment.len());
    let (path, query) = without_fragment.split_at(path_end);
    let path = path.split(';').next().unwrap_or_default();

    let kept: Vec<&str> = query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default().to_ascii_lowercase();
            !SESSION_PARAMS.contains(&key.as_str())
        })
        .collect();

    if kept.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, kept.join("&"))
    }
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                if is_volatile(&child_el) {
                    continue;
                }
                let link = match element.name() {
                    "a" => element.attr("href"),
                    "img" => element.attr("src"),
                    _ => None,
                };
                if let Some(link) = link {
                    out.push_str(&stable_link(link));
                    out.push(' ');
                }
                collect_text(child_el, out);
            }
            _ => {}
        }
    }
}

/// Strips dates, times, "last updated" phrases, and visit counters
fn strip_volatile_text(text: &str) -> String {
    let text = RE_LAST_UPDATED.replace_all(text, " ");
    let text = RE_VISITORS.replace_all(&text, " ");
    let text = RE_TEXT_DATE.replace_all(&text, " ");
    let text = RE_NUMERIC_DATE.replace_all(&text, " ");
    let text = RE_TIME.replace_all(&text, " ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fingerprints a listing page's meaningful content
///
/// Scripts, styles, navigation, footers, ad/counter/pagination widgets, and
/// every attribute except link targets are dropped; session parameters are
/// removed from links; dates, times, "last updated" phrases, and visit
/// counters are stripped from the text. The collapsed remainder is hashed
/// with SHA-256.
///
/// # Example
///
/// ```
/// use docket::change::compute_fingerprint;
///
/// let a = compute_fingerprint("<p>Notices</p><p>Last updated: 12/03/2024 10:15</p>");
/// let b = compute_fingerprint("<p>Notices</p><p>Last updated: 13/03/2024 09:02</p>");
/// assert_eq!(a, b);
/// ```
pub fn compute_fingerprint(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(doc.root_element(), &mut raw);

    let stable = strip_volatile_text(&raw);
    let mut hasher = Sha256::new();
    hasher.update(stable.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(updated: &str, session: &str, counter: &str) -> String {
        format!(
            r#"<html><head><title>Circulars</title><script>var t = {counter};</script></head>
            <body>
              <nav><a href="/home">Home</a></nav>
              <div id="visitor-counter">{counter}</div>
              <table>
                <tr><td>Revision of licence fees</td>
                    <td><a href="/docs/c1.pdf?sid={session}" data-nonce="{session}">Download</a></td></tr>
              </table>
              <p>Last updated: {updated}</p>
              <footer>Generated at {updated}</footer>
            </body></html>"#
        )
    }

    #[test]
    fn test_stable_across_volatile_chrome() {
        let first = compute_fingerprint(&page("Tue, 12 March 2024 10:15 AM", "abc123", "1042"));
        let second = compute_fingerprint(&page("Wed, 13 March 2024 11:20 AM", "zz9", "1187"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_changes_with_content() {
        let base = page("12/03/2024", "a", "1");
        let changed = base.replace("Revision of licence fees", "Revision of spectrum fees");
        assert_ne!(compute_fingerprint(&base), compute_fingerprint(&changed));
    }

    #[test]
    fn test_changes_with_new_link() {
        let base = page("12/03/2024", "a", "1");
        let changed = base.replace("/docs/c1.pdf", "/docs/c2.pdf");
        assert_ne!(compute_fingerprint(&base), compute_fingerprint(&changed));
    }

    #[test]
    fn test_stable_link() {
        assert_eq!(
            stable_link("/a.pdf;jsessionid=XYZ?id=4&PHPSESSID=1&_ts=99#top"),
            "/a.pdf?id=4"
        );
        assert_eq!(stable_link("/list?sid=1"), "/list");
    }

    #[test]
    fn test_strip_volatile_text() {
        assert_eq!(
            strip_volatile_text("Notices Last modified on: March 5, 2024 17:45 IST Visitors: 12,345"),
            "Notices"
        );
        assert_eq!(strip_volatile_text("Order 2024-01-31 issued"), "Order issued");
    }

    #[test]
    fn test_malformed_html_still_hashes() {
        assert_eq!(compute_fingerprint("<div><p>unclosed").len(), 64);
        assert_eq!(compute_fingerprint(""), compute_fingerprint("   "));
    }
}
