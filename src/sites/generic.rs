//! Generic (fallback) site scraper.
//!
//! Works on arbitrary listing pages: prefers links inside the main content
//! area, then any document link on the page.

use super::common::{derive_title, discover_pagination, select_documents};
use super::{DiscoveredDocument, ParsedPage, SiteInfo, SiteScraper};

/// Selection rules, most specific first
const RULES: &[&str] = &[
    "main a[href]",
    "#content a[href]",
    ".content a[href]",
    "article a[href]",
    "table a[href]",
    "a[href]",
];

pub struct GenericScraper {
    max_next_pages: usize,
}

impl GenericScraper {
    pub fn new(max_next_pages: usize) -> Self {
        Self { max_next_pages }
    }
}

impl SiteScraper for GenericScraper {
    fn discover_documents(&self, page: &ParsedPage) -> Vec<DiscoveredDocument> {
        let doc = page.document();
        select_documents(&doc, &page.url, RULES, derive_title)
    }

    fn discover_next_pages(&self, page: &ParsedPage) -> Vec<String> {
        let doc = page.document();
        discover_pagination(&doc, &page.url, &[], self.max_next_pages)
    }

    fn site_info(&self) -> SiteInfo {
        SiteInfo {
            name: "generic",
            description: "Any listing page linking to document files",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::FileType;
    use url::Url;

    fn page(html: &str) -> ParsedPage {
        ParsedPage::new(Url::parse("https://example.gov/notices").unwrap(), html)
    }

    #[test]
    fn test_prefers_main_content() {
        let html = r#"
            <nav><a href="/menu.pdf">Site map</a></nav>
            <main>
                <a href="/a.pdf">Revised tariff order</a>
                <a href="/b.docx">Draft regulations</a>
            </main>"#;
        let docs = GenericScraper::new(5).discover_documents(&page(html));
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].url, "https://example.gov/a.pdf");
        assert_eq!(docs[1].file_type, FileType::Docx);
    }

    #[test]
    fn test_empty_page_yields_nothing() {
        let scraper = GenericScraper::new(5);
        assert!(scraper.discover_documents(&page("")).is_empty());
        assert!(scraper.discover_next_pages(&page("")).is_empty());
    }

    #[test]
    fn test_next_pages() {
        let html = r#"<a href="/notices?page=2">Next</a>"#;
        assert_eq!(
            GenericScraper::new(5).discover_next_pages(&page(html)),
            vec!["https://example.gov/notices?page=2".to_string()]
        );
    }
}
