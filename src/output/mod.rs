//! Output module for cycle summaries and corpus reports
//!
//! This module handles:
//! - The per-cycle statistics returned by a crawl cycle
//! - Per-item error entries collected during a cycle
//! - Corpus statistics read back from the store

pub mod stats;

pub use stats::{
    load_statistics, print_cycle_stats, print_statistics, CorpusStatistics, CycleError,
    CycleStats, ErrorKind, SourceSummary,
};
