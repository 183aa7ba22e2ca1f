//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Docket database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Listing sources and their persisted frontier pointer
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    source_type TEXT NOT NULL,
    seed_url TEXT NOT NULL,
    frontier_url TEXT,
    frontier_depth INTEGER NOT NULL DEFAULT 0,
    halted_url TEXT,
    last_full_scan_at TEXT,
    last_crawled_at TEXT,
    created_at TEXT NOT NULL
);

-- Track crawl cycles
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    mode TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL,
    stats_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_runs_source ON crawl_runs(source_id);

-- One record per normalized URL per source
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    url TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    document_id INTEGER REFERENCES documents(id),
    UNIQUE(source_id, url)
);

-- Version clusters
CREATE TABLE IF NOT EXISTS families (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    canonical_title TEXT NOT NULL,
    category TEXT,
    owner TEXT,
    centroid TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_families_title ON families(canonical_title);
CREATE INDEX IF NOT EXISTS idx_families_category_owner ON families(category, owner);

-- One row per admitted document version
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    title TEXT NOT NULL,
    file_name TEXT,
    file_type TEXT NOT NULL,
    family_id INTEGER NOT NULL REFERENCES families(id),
    version TEXT NOT NULL,
    is_latest_version INTEGER NOT NULL DEFAULT 1,
    supersedes_id INTEGER REFERENCES documents(id),
    superseded_by_id INTEGER REFERENCES documents(id),
    last_modified_at_source TEXT,
    embedding TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_url ON documents(url);
CREATE INDEX IF NOT EXISTS idx_documents_normalized_url ON documents(normalized_url);
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(content_hash);
CREATE INDEX IF NOT EXISTS idx_documents_family ON documents(family_id, is_latest_version);

-- Additional URLs observed serving an already-known document
CREATE TABLE IF NOT EXISTS document_sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id INTEGER NOT NULL REFERENCES documents(id),
    url TEXT NOT NULL,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    added_at TEXT NOT NULL,
    UNIQUE(document_id, url)
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
