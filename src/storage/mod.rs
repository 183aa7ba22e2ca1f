//! Storage module for the persisted corpus
//!
//! This module handles all database operations for the engine, including:
//! - SQLite database initialization and schema management
//! - Source frontier pointers and crawl run tracking
//! - Page fingerprint records
//! - Documents, version lineage, and provenance
//! - Families and their centroids

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{DocumentLookup, Storage, StorageError, StorageResult};

use crate::DocketError;

use std::path::Path;

/// Initializes or opens a storage database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, DocketError> {
    SqliteStorage::new(path)
}

/// A listing source and its persisted frontier pointer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub seed_url: String,
    /// Deepest listing page reached by the previous walk
    pub frontier_url: Option<String>,
    /// Walk position of `frontier_url` (1-based; 0 when unset)
    pub frontier_depth: u32,
    /// Page beyond the window that exhausted its retries; incremental walks
    /// skip it until a full scan reaches it again
    pub halted_url: Option<String>,
    pub last_full_scan_at: Option<String>,
    pub last_crawled_at: Option<String>,
}

impl SourceRecord {
    /// True when no cycle has completed for this source yet
    pub fn never_crawled(&self) -> bool {
        self.last_crawled_at.is_none()
    }
}

/// Represents a page in the database
#[derive(Debug, Clone, PartialEq)]
pub struct PageRecord {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub fingerprint: String,
    pub first_seen_at: String,
    pub last_seen_at: String,
    pub document_id: Option<i64>,
}

/// A stored document version
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub content_hash: String,
    pub title: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub family_id: i64,
    pub version: String,
    pub is_latest_version: bool,
    pub supersedes_id: Option<i64>,
    pub superseded_by_id: Option<i64>,
    pub last_modified_at_source: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

/// A stored family
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRecord {
    pub id: i64,
    pub canonical_title: String,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub centroid: Option<Vec<f32>>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a family about to be created
#[derive(Debug, Clone)]
pub struct NewFamily {
    pub canonical_title: String,
    pub category: Option<String>,
    pub owner: Option<String>,
    pub centroid: Option<Vec<f32>>,
}

/// Fields for a document version about to be inserted
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub source_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub content_hash: String,
    pub title: String,
    pub file_name: Option<String>,
    pub file_type: String,
    pub last_modified_at_source: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// Everything written by one version admission, committed atomically
#[derive(Debug, Clone)]
pub struct VersionAdmission {
    pub document: NewDocument,
    pub family_id: i64,
    pub version: String,
    /// Current latest version being superseded, if any
    pub supersedes_id: Option<i64>,
    /// Recomputed family centroid; `None` leaves the stored centroid as is
    pub centroid: Option<Vec<f32>>,
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source_id: i64,
    pub mode: String,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub stats_json: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            _ => None,
        }
    }
}

/// Aggregate row counts for the `--stats` report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorpusCounts {
    pub sources: u64,
    pub documents: u64,
    pub latest_documents: u64,
    pub families: u64,
    pub provenance_links: u64,
    pub pages: u64,
    pub runs: u64,
}
