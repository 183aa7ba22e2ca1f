//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    CorpusCounts, DocumentRecord, FamilyRecord, NewFamily, PageRecord, RunRecord, RunStatus,
    SourceRecord, VersionAdmission,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(i64),

    #[error("Family not found: {0}")]
    FamilyNotFound(i64),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Read-only document lookups used by identity resolution
///
/// Split from [`Storage`] so the resolver can run against anything that
/// answers these four indexed queries.
pub trait DocumentLookup {
    /// Latest document observed at exactly this URL, directly or as an added
    /// provenance URL
    fn find_latest_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Any document carrying this content hash (lowest id wins)
    fn find_by_hash(&self, content_hash: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Latest document whose identity key equals `key`
    fn find_latest_by_normalized_url(&self, key: &str) -> StorageResult<Option<DocumentRecord>>;

    /// Most recently written latest versions for a source, newest first
    fn recent_documents(&self, source_id: i64, limit: usize)
        -> StorageResult<Vec<DocumentRecord>>;
}

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the engine.
pub trait Storage: DocumentLookup {
    // ===== Sources =====

    /// Inserts the source if unknown and returns its record
    fn upsert_source(
        &mut self,
        name: &str,
        source_type: &str,
        seed_url: &str,
    ) -> StorageResult<SourceRecord>;

    /// Gets a source by name
    fn get_source(&self, name: &str) -> StorageResult<Option<SourceRecord>>;

    /// Lists all sources
    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    /// Persists the frontier pointer at the end of a cycle
    ///
    /// `full_scan` also stamps `last_full_scan_at`.
    fn update_frontier(
        &mut self,
        source_id: i64,
        frontier_url: Option<&str>,
        frontier_depth: u32,
        full_scan: bool,
    ) -> StorageResult<()>;

    /// Records (or clears) the page an earlier walk could not get past
    fn update_halted_page(&mut self, source_id: i64, url: Option<&str>) -> StorageResult<()>;

    // ===== Runs =====

    /// Creates a new crawl run in the running state
    fn create_run(&mut self, source_id: i64, mode: &str, config_hash: &str) -> StorageResult<i64>;

    /// Marks a run finished with its final status and serialized stats
    fn finish_run(&mut self, run_id: i64, status: RunStatus, stats_json: &str)
        -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run for a source
    fn get_latest_run(&self, source_id: i64) -> StorageResult<Option<RunRecord>>;

    // ===== Pages =====

    /// Gets the page record for a normalized URL within a source
    fn get_page(&self, source_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Inserts or overwrites the stored fingerprint, bumping `last_seen_at`
    fn upsert_page(&mut self, source_id: i64, url: &str, fingerprint: &str) -> StorageResult<i64>;

    /// Bumps `last_seen_at` without changing the fingerprint
    fn touch_page(&mut self, source_id: i64, url: &str) -> StorageResult<()>;

    /// Upserts a page record for a document URL and links the document
    fn link_page_document(
        &mut self,
        source_id: i64,
        url: &str,
        fingerprint: &str,
        document_id: i64,
    ) -> StorageResult<()>;

    // ===== Documents =====

    /// Gets a document by ID
    fn get_document(&self, document_id: i64) -> StorageResult<DocumentRecord>;

    /// All versions in a family, oldest first
    fn family_documents(&self, family_id: i64) -> StorageResult<Vec<DocumentRecord>>;

    /// The family's current latest version
    fn latest_in_family(&self, family_id: i64) -> StorageResult<Option<DocumentRecord>>;

    /// ID of a family member carrying this content hash
    fn find_in_family_by_hash(
        &self,
        family_id: i64,
        content_hash: &str,
    ) -> StorageResult<Option<i64>>;

    /// Embeddings of the most recent members, newest first
    fn sample_family_embeddings(&self, family_id: i64, limit: usize)
        -> StorageResult<Vec<Vec<f32>>>;

    /// Records an additional URL serving a known document
    ///
    /// Returns false when the pair was already recorded.
    fn add_document_source(
        &mut self,
        document_id: i64,
        url: &str,
        source_id: i64,
    ) -> StorageResult<bool>;

    /// Provenance URLs recorded for a document
    fn document_sources(&self, document_id: i64) -> StorageResult<Vec<String>>;

    /// Writes a new version, supersession pointers, latest flags, and the
    /// family centroid in one transaction; returns the new document ID
    fn commit_admission(&mut self, admission: &VersionAdmission) -> StorageResult<i64>;

    // ===== Families =====

    /// Creates a family and returns its ID
    fn create_family(&mut self, family: &NewFamily) -> StorageResult<i64>;

    /// Gets a family by ID
    fn get_family(&self, family_id: i64) -> StorageResult<FamilyRecord>;

    /// Family with exactly this canonical title (oldest wins)
    fn find_family_by_canonical_title(&self, title: &str) -> StorageResult<Option<FamilyRecord>>;

    /// Families sharing category and owner (NULLs compare equal)
    fn families_by_category_owner(
        &self,
        category: Option<&str>,
        owner: Option<&str>,
    ) -> StorageResult<Vec<FamilyRecord>>;

    // ===== Statistics =====

    /// Row counts across the corpus
    fn corpus_counts(&self) -> StorageResult<CorpusCounts>;
}
