//! Site scrapers for listing pages
//!
//! A scraper turns one fetched listing page into the document links it lists
//! and the pagination links that lead further into the listing. Variants are
//! selected per source through a [`ScraperRegistry`] keyed by the source's
//! `source-type` token.
//!
//! # Variants
//!
//! - `generic`: any page linking to document files (the fallback)
//! - `table-listing`: tabular notice boards where the subject sits in a cell
//! - `archive`: blog-style archives with `/page/N/` pagination

mod archive;
mod common;
mod generic;
mod table_listing;

use scraper::Html;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub use archive::ArchiveScraper;
pub use common::{clean_text, title_from_file_name};
pub use generic::GenericScraper;
pub use table_listing::TableListingScraper;

/// Source-type tokens with a registered scraper
pub const KNOWN_SOURCE_TYPES: &[&str] = &["generic", "table-listing", "archive"];

/// Default cap on pagination links returned per page
pub const DEFAULT_MAX_NEXT_PAGES: usize = 5;

/// File type of a discovered document, derived from its URL extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Csv,
    Txt,
    Rtf,
    Odt,
    Html,
    Other,
}

impl FileType {
    /// Infers the file type from the last path segment's extension
    pub fn from_url(url: &Url) -> Self {
        let extension = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some(ext) => Self::from_extension(ext),
            None => Self::Html,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "pdf" => Self::Pdf,
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "csv" => Self::Csv,
            "txt" => Self::Txt,
            "rtf" => Self::Rtf,
            "odt" => Self::Odt,
            "htm" | "html" | "php" | "asp" | "aspx" | "jsp" => Self::Html,
            _ => Self::Other,
        }
    }

    /// True for downloadable document formats (not web pages)
    pub fn is_document(&self) -> bool {
        !matches!(self, Self::Html | Self::Other)
    }

    /// True when the body can be read as text without a converter
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Txt | Self::Csv | Self::Html)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Txt => "txt",
            Self::Rtf => "rtf",
            Self::Odt => "odt",
            Self::Html => "html",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fetched listing page
///
/// Holds the raw body rather than a parsed tree so it can cross await points;
/// scrapers parse on demand.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub url: Url,
    pub body: String,
}

impl ParsedPage {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }

    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// A document link found on a listing page
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredDocument {
    /// Absolute document URL
    pub url: String,
    pub title: String,
    pub file_type: FileType,
    /// Surrounding row or container text, if any
    pub context: Option<String>,
}

/// Descriptive information about a scraper variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Extracts document and pagination links from listing pages
///
/// Implementations never fail: malformed input yields an empty list, and a
/// selector that cannot be applied is logged and skipped.
pub trait SiteScraper: Send + Sync {
    /// Document links on the page, deduplicated by URL
    fn discover_documents(&self, page: &ParsedPage) -> Vec<DiscoveredDocument>;

    /// Pagination links leading deeper into the listing, capped in length
    fn discover_next_pages(&self, page: &ParsedPage) -> Vec<String>;

    fn site_info(&self) -> SiteInfo;
}

/// Maps source-type tokens to scraper variants
pub struct ScraperRegistry {
    scrapers: HashMap<String, Arc<dyn SiteScraper>>,
    fallback: Arc<dyn SiteScraper>,
}

impl ScraperRegistry {
    /// Creates a registry with every built-in variant
    pub fn new(max_next_pages: usize) -> Self {
        let fallback: Arc<dyn SiteScraper> = Arc::new(GenericScraper::new(max_next_pages));
        let mut registry = Self {
            scrapers: HashMap::new(),
            fallback: Arc::clone(&fallback),
        };
        registry.register("generic", fallback);
        registry.register(
            "table-listing",
            Arc::new(TableListingScraper::new(max_next_pages)),
        );
        registry.register("archive", Arc::new(ArchiveScraper::new(max_next_pages)));
        registry
    }

    /// Registers (or replaces) the scraper for a token
    pub fn register(&mut self, token: &str, scraper: Arc<dyn SiteScraper>) {
        self.scrapers.insert(token.to_string(), scraper);
    }

    /// Scraper for a token, falling back to the generic variant
    pub fn get(&self, token: &str) -> Arc<dyn SiteScraper> {
        match self.scrapers.get(token) {
            Some(scraper) => Arc::clone(scraper),
            None => {
                tracing::warn!(source_type = %token, "Unknown source type, using generic scraper");
                Arc::clone(&self.fallback)
            }
        }
    }

    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.scrapers.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

impl Default for ScraperRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NEXT_PAGES)
    }
}
