//! Scraper for blog-style archives.
//!
//! Posts sit in `article` or `.entry-content` containers and pagination uses
//! `/page/N/` paths with "Older posts" links.

use super::common::{
    clean_text, derive_title, discover_pagination, is_meaningful, link_text, select_documents,
    title_attribute,
};
use super::{DiscoveredDocument, ParsedPage, SiteInfo, SiteScraper};
use scraper::{ElementRef, Selector};
use url::Url;

const RULES: &[&str] = &[
    "article a[href]",
    ".entry-content a[href]",
    ".post a[href]",
    "a[href]",
];

const PAGER_SELECTORS: &[&str] = &[".nav-previous a[href]", ".nav-links a.next[href]"];

pub struct ArchiveScraper {
    max_next_pages: usize,
}

impl ArchiveScraper {
    pub fn new(max_next_pages: usize) -> Self {
        Self { max_next_pages }
    }
}

/// Heading of the enclosing post
fn article_heading(el: &ElementRef<'_>) -> Option<String> {
    let article = el
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "article")?;
    let heading = Selector::parse("h1, h2, h3, .entry-title").ok()?;
    article
        .select(&heading)
        .next()
        .map(|h| clean_text(&h.text().collect::<String>()))
        .filter(|t| is_meaningful(t))
}

fn post_title(el: &ElementRef<'_>, url: &Url) -> String {
    link_text(el)
        .or_else(|| title_attribute(el))
        .or_else(|| article_heading(el))
        .unwrap_or_else(|| derive_title(el, url))
}

impl SiteScraper for ArchiveScraper {
    fn discover_documents(&self, page: &ParsedPage) -> Vec<DiscoveredDocument> {
        let doc = page.document();
        select_documents(&doc, &page.url, RULES, post_title)
    }

    fn discover_next_pages(&self, page: &ParsedPage) -> Vec<String> {
        let doc = page.document();
        discover_pagination(&doc, &page.url, PAGER_SELECTORS, self.max_next_pages)
    }

    fn site_info(&self) -> SiteInfo {
        SiteInfo {
            name: "archive",
            description: "Blog-style archives with /page/N/ pagination",
        }
    }
}
