//! Default content extractor

use super::{ContentExtractor, ExtractedText, ExtractionError};
use crate::sites::{clean_text, FileType};
use scraper::{Html, Node};

/// Share of printable characters below which a binary body counts as scanned
const MIN_PRINTABLE_RATIO: f64 = 0.6;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Extracts text without external converters
///
/// HTML is reduced to its visible text, text-like types are decoded as
/// UTF-8, and other binaries are decoded lossily and flagged as scanned when
/// mostly unprintable.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();

    for node in doc.root_element().descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
            });
            if !hidden {
                out.push_str(text);
                out.push(' ');
            }
        }
    }

    clean_text(&out)
}

fn printable_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let printable = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_ascii_punctuation() || c.is_whitespace())
        .count();
    printable as f64 / total as f64
}

impl ContentExtractor for PlainTextExtractor {
    fn extract_text(
        &self,
        bytes: &[u8],
        file_type: FileType,
    ) -> Result<ExtractedText, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::EmptyBody);
        }

        let decoded = String::from_utf8_lossy(bytes);
        let (text, is_scanned) = match file_type {
            FileType::Html => (visible_text(&decoded), false),
            ft if ft.is_text_like() => (decoded.trim().to_string(), false),
            _ => {
                let scanned = printable_ratio(&decoded) < MIN_PRINTABLE_RATIO;
                (decoded.into_owned(), scanned)
            }
        };

        if text.trim().is_empty() {
            return Err(ExtractionError::NoText(file_type.to_string()));
        }

        Ok(ExtractedText { text, is_scanned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_visible_text() {
        let html = "<html><head><title>T</title><style>p{}</style></head>\
                    <body><p>Fee   revision</p><script>var x;</script><p>notice</p></body></html>";
        let out = PlainTextExtractor.extract_text(html.as_bytes(), FileType::Html).unwrap();
        assert_eq!(out.text, "Fee revision notice");
        assert!(!out.is_scanned);
    }

    #[test]
    fn test_text_like_types() {
        let out = PlainTextExtractor
            .extract_text(b"  a,b\n1,2  ", FileType::Csv)
            .unwrap();
        assert_eq!(out.text, "a,b\n1,2");
    }

    #[test]
    fn test_binary_flags_scanned() {
        let bytes: Vec<u8> = (0u8..=255).cycle().take(2048).collect();
        let out = PlainTextExtractor.extract_text(&bytes, FileType::Pdf).unwrap();
        assert!(out.is_scanned);

        let out = PlainTextExtractor
            .extract_text(b"Revision of licence fees for 2024", FileType::Pdf)
            .unwrap();
        assert!(!out.is_scanned);
    }

    #[test]
    fn test_empty_body_is_an_error() {
        assert!(matches!(
            PlainTextExtractor.extract_text(b"", FileType::Pdf),
            Err(ExtractionError::EmptyBody)
        ));
        assert!(matches!(
            PlainTextExtractor.extract_text(b"   ", FileType::Txt),
            Err(ExtractionError::NoText(_))
        ));
    }
}
