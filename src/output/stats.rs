//! Cycle and corpus statistics
//!
//! [`CycleStats`] is the summary every crawl cycle returns, whether it ran to
//! completion, was cancelled, or failed item by item. [`CorpusStatistics`]
//! is read back from the store for the `--stats` report.

use crate::state::ScanMode;
use crate::storage::{CorpusCounts, Storage, StorageResult};
use serde::Serialize;
use std::fmt;

/// Category of a per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Page or document could not be fetched
    Fetch,
    /// No selector matched on a processed page
    Parse,
    /// Store unavailable during identity resolution
    IdentityLookup,
    /// Write or transaction failure
    Persistence,
    /// Text extraction collaborator failed
    Extraction,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::IdentityLookup => "identity_lookup",
            Self::Persistence => "persistence",
            Self::Extraction => "extraction",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed page or document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleError {
    pub url: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl CycleError {
    pub fn new(url: impl Into<String>, kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            url: url.into(),
            kind,
            message: message.to_string(),
        }
    }
}

/// Summary of one crawl cycle over one source
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub source: String,
    pub run_id: Option<i64>,
    pub mode: &'static str,
    pub pages_visited: u64,
    pub pages_changed: u64,
    pub documents_discovered: u64,
    pub documents_new: u64,
    pub documents_updated: u64,
    pub documents_skipped: u64,
    pub documents_duplicate: u64,
    pub families_created: u64,
    pub cancelled: bool,
    pub errors: Vec<CycleError>,
}

impl CycleStats {
    pub fn new(source: &str, mode: ScanMode) -> Self {
        Self {
            source: source.to_string(),
            run_id: None,
            mode: mode.to_db_string(),
            pages_visited: 0,
            pages_changed: 0,
            documents_discovered: 0,
            documents_new: 0,
            documents_updated: 0,
            documents_skipped: 0,
            documents_duplicate: 0,
            families_created: 0,
            cancelled: false,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, error: CycleError) {
        tracing::warn!(url = %error.url, kind = %error.kind, "{}", error.message);
        self.errors.push(error);
    }

    /// Number of errors of one kind
    pub fn error_count(&self, kind: ErrorKind) -> usize {
        self.errors.iter().filter(|e| e.kind == kind).count()
    }

    /// JSON stored on the crawl run record
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Prints a cycle summary to stdout
pub fn print_cycle_stats(stats: &CycleStats) {
    println!("=== {} ({} scan) ===", stats.source, stats.mode);
    if let Some(run_id) = stats.run_id {
        println!("  Run: {}", run_id);
    }
    println!(
        "  Pages: {} visited, {} changed",
        stats.pages_visited, stats.pages_changed
    );
    println!(
        "  Documents: {} discovered, {} new, {} updated, {} skipped, {} duplicate",
        stats.documents_discovered,
        stats.documents_new,
        stats.documents_updated,
        stats.documents_skipped,
        stats.documents_duplicate
    );
    println!("  Families created: {}", stats.families_created);
    if stats.cancelled {
        println!("  Cancelled before completion");
    }

    if !stats.errors.is_empty() {
        println!("  Errors ({}):", stats.errors.len());
        for error in &stats.errors {
            println!("    [{}] {}: {}", error.kind, error.url, error.message);
        }
    }
    println!();
}

/// Per-source line of the corpus report
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSummary {
    pub name: String,
    pub frontier_depth: u32,
    pub last_crawled_at: Option<String>,
    pub last_run_status: Option<String>,
}

/// Corpus-wide statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusStatistics {
    pub counts: CorpusCounts,
    pub sources: Vec<SourceSummary>,
}

/// Loads statistics from storage
pub fn load_statistics<S: Storage + ?Sized>(storage: &S) -> StorageResult<CorpusStatistics> {
    let counts = storage.corpus_counts()?;

    let mut sources = Vec::new();
    for source in storage.list_sources()? {
        let last_run = storage.get_latest_run(source.id)?;
        sources.push(SourceSummary {
            name: source.name,
            frontier_depth: source.frontier_depth,
            last_crawled_at: source.last_crawled_at,
            last_run_status: last_run.map(|run| run.status.to_db_string().to_string()),
        });
    }

    Ok(CorpusStatistics { counts, sources })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CorpusStatistics) {
    let counts = &stats.counts;
    println!("=== Corpus Statistics ===\n");

    println!("Overview:");
    println!("  Documents: {}", counts.documents);
    println!("  Latest versions: {}", counts.latest_documents);
    println!("  Families: {}", counts.families);
    println!("  Provenance links: {}", counts.provenance_links);
    println!("  Page records: {}", counts.pages);
    println!("  Crawl runs: {}", counts.runs);
    println!();

    if counts.families > 0 {
        println!(
            "Average versions per family: {:.2}",
            counts.documents as f64 / counts.families as f64
        );
        println!();
    }

    println!("Sources ({}):", counts.sources);
    for source in &stats.sources {
        println!(
            "  {}: frontier depth {}, last crawled {}, last run {}",
            source.name,
            source.frontier_depth,
            source.last_crawled_at.as_deref().unwrap_or("never"),
            source.last_run_status.as_deref().unwrap_or("none")
        );
    }
}
