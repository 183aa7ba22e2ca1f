//! Scraper for tabular notice boards.
//!
//! Government listings typically render one notice per table row: a serial
//! number, a date, a subject cell, and a "Download"/"View" link. The subject
//! cell is the title; the link text is only used when no cell qualifies.

use super::common::{
    derive_title, discover_pagination, select_documents, sibling_cell_text,
};
use super::{DiscoveredDocument, ParsedPage, SiteInfo, SiteScraper};
use scraper::ElementRef;
use url::Url;

const RULES: &[&str] = &[
    "table tbody tr td a[href]",
    "table tr td a[href]",
    ".table a[href]",
    "a[href]",
];

const PAGER_SELECTORS: &[&str] = &[".pagination a[rel='next']", ".pager-next a[href]"];

pub struct TableListingScraper {
    max_next_pages: usize,
}

impl TableListingScraper {
    pub fn new(max_next_pages: usize) -> Self {
        Self { max_next_pages }
    }
}

fn row_title(el: &ElementRef<'_>, url: &Url) -> String {
    sibling_cell_text(el).unwrap_or_else(|| derive_title(el, url))
}

impl SiteScraper for TableListingScraper {
    fn discover_documents(&self, page: &ParsedPage) -> Vec<DiscoveredDocument> {
        let doc = page.document();
        select_documents(&doc, &page.url, RULES, row_title)
    }

    fn discover_next_pages(&self, page: &ParsedPage) -> Vec<String> {
        let doc = page.document();
        discover_pagination(&doc, &page.url, PAGER_SELECTORS, self.max_next_pages)
    }

    fn site_info(&self) -> SiteInfo {
        SiteInfo {
            name: "table-listing",
            description: "Tabular notice boards with one document per row",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> ParsedPage {
        ParsedPage::new(Url::parse("https://example.gov/circulars").unwrap(), html)
    }

    const TABLE: &str = r#"
        <table>
          <thead><tr><th>S.No</th><th>Date</th><th>Subject</th><th>File</th></tr></thead>
          <tbody>
            <tr><td>1</td><td>02-05-2024</td><td>Revision of licence fees</td>
                <td><a href="/docs/c1.pdf">Download (240 KB)</a></td></tr>
            <tr><td>2</td><td>28-04-2024</td><td>Guidelines for e-auction</td>
                <td><a href="/docs/c2.pdf">View</a></td></tr>
          </tbody>
        </table>
        <ul class="pagination"><li><a href="/circulars?page=2" rel="next">2</a></li></ul>"#;

    #[test]
    fn test_titles_come_from_subject_cell() {
        let docs = TableListingScraper::new(5).discover_documents(&page(TABLE));
        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Revision of licence fees", "Guidelines for e-auction"]);
        assert!(docs[0].context.as_deref().unwrap().contains("02-05-2024"));
    }

    #[test]
    fn test_link_outside_table_uses_fallback_chain() {
        let html = r#"<p><a href="/docs/annual-report.pdf">Annual report 2023</a></p>"#;
        let docs = TableListingScraper::new(5).discover_documents(&page(html));
        assert_eq!(docs[0].title, "Annual report 2023");
    }

    #[test]
    fn test_next_pages() {
        assert_eq!(
            TableListingScraper::new(5).discover_next_pages(&page(TABLE)),
            vec!["https://example.gov/circulars?page=2".to_string()]
        );
    }
}
