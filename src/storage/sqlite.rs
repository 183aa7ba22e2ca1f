//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DocumentLookup, Storage, StorageError, StorageResult};
use crate::storage::{
    CorpusCounts, DocumentRecord, FamilyRecord, NewFamily, PageRecord, RunRecord, RunStatus,
    SourceRecord, VersionAdmission,
};
use crate::DocketError;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const DOCUMENT_COLUMNS: &str = "id, source_id, url, normalized_url, content_hash, title, file_name,
     file_type, family_id, version, is_latest_version, supersedes_id, superseded_by_id,
     last_modified_at_source, embedding, created_at, updated_at";

const FAMILY_COLUMNS: &str =
    "id, canonical_title, category, owner, centroid, created_at, updated_at";

const SOURCE_COLUMNS: &str = "id, name, source_type, seed_url, frontier_url, frontier_depth,
     halted_url, last_full_scan_at, last_crawled_at";

const RUN_COLUMNS: &str =
    "id, source_id, mode, config_hash, started_at, finished_at, status, stats_json";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path`
    ///
    /// Distinct sources crawling concurrently each open their own connection
    /// to the same file; WAL mode lets readers proceed during a writer's
    /// transaction.
    pub fn new(path: &Path) -> Result<Self, DocketError> {
        let conn = Connection::open(path).map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and dry runs)
    pub fn new_in_memory() -> Result<Self, DocketError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }

    fn query_document(
        &self,
        where_clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> StorageResult<Option<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE {} LIMIT 1",
            DOCUMENT_COLUMNS, where_clause
        );
        let doc = self
            .conn
            .query_row(&sql, [param], row_to_document)
            .optional()?;
        Ok(doc)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn encode_vector(vector: Option<&[f32]>) -> StorageResult<Option<String>> {
    vector
        .map(|v| serde_json::to_string(v).map_err(|e| StorageError::Serialization(e.to_string())))
        .transpose()
}

fn decode_vector(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        normalized_url: row.get(3)?,
        content_hash: row.get(4)?,
        title: row.get(5)?,
        file_name: row.get(6)?,
        file_type: row.get(7)?,
        family_id: row.get(8)?,
        version: row.get(9)?,
        is_latest_version: row.get(10)?,
        supersedes_id: row.get(11)?,
        superseded_by_id: row.get(12)?,
        last_modified_at_source: row.get(13)?,
        embedding: decode_vector(row, 14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

fn row_to_family(row: &Row<'_>) -> rusqlite::Result<FamilyRecord> {
    Ok(FamilyRecord {
        id: row.get(0)?,
        canonical_title: row.get(1)?,
        category: row.get(2)?,
        owner: row.get(3)?,
        centroid: decode_vector(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_source(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        source_type: row.get(2)?,
        seed_url: row.get(3)?,
        frontier_url: row.get(4)?,
        frontier_depth: row.get(5)?,
        halted_url: row.get(6)?,
        last_full_scan_at: row.get(7)?,
        last_crawled_at: row.get(8)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        mode: row.get(2)?,
        config_hash: row.get(3)?,
        started_at: row.get(4)?,
        finished_at: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Interrupted),
        stats_json: row.get(7)?,
    })
}

fn row_to_page(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        fingerprint: row.get(3)?,
        first_seen_at: row.get(4)?,
        last_seen_at: row.get(5)?,
        document_id: row.get(6)?,
    })
}

impl DocumentLookup for SqliteStorage {
    fn find_latest_by_url(&self, url: &str) -> StorageResult<Option<DocumentRecord>> {
        if let Some(doc) = self.query_document("url = ?1 ORDER BY id DESC", &url)? {
            return Ok(Some(doc));
        }

        // Fall back to URLs recorded as provenance of an existing document
        let linked: Option<i64> = self
            .conn
            .query_row(
                "SELECT document_id FROM document_sources WHERE url = ?1 ORDER BY id DESC LIMIT 1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;

        match linked {
            Some(id) => Ok(Some(self.get_document(id)?)),
            None => Ok(None),
        }
    }

    fn find_by_hash(&self, content_hash: &str) -> StorageResult<Option<DocumentRecord>> {
        self.query_document("content_hash = ?1 ORDER BY id ASC", &content_hash)
    }

    fn find_latest_by_normalized_url(&self, key: &str) -> StorageResult<Option<DocumentRecord>> {
        self.query_document("normalized_url = ?1 ORDER BY id DESC", &key)
    }

    fn recent_documents(
        &self,
        source_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE source_id = ?1 AND is_latest_version = 1
             ORDER BY id DESC LIMIT ?2",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params![source_id, limit as i64], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }
}

impl Storage for SqliteStorage {
    // ===== Sources =====

    fn upsert_source(
        &mut self,
        name: &str,
        source_type: &str,
        seed_url: &str,
    ) -> StorageResult<SourceRecord> {
        self.conn.execute(
            "INSERT INTO sources (name, source_type, seed_url, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET source_type = excluded.source_type,
                                             seed_url = excluded.seed_url",
            params![name, source_type, seed_url, now()],
        )?;

        self.get_source(name)?
            .ok_or_else(|| StorageError::SourceNotFound(name.to_string()))
    }

    fn get_source(&self, name: &str) -> StorageResult<Option<SourceRecord>> {
        let sql = format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS);
        let source = self
            .conn
            .query_row(&sql, params![name], row_to_source)
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let sql = format!("SELECT {} FROM sources ORDER BY name", SOURCE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let sources = stmt
            .query_map([], row_to_source)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn update_frontier(
        &mut self,
        source_id: i64,
        frontier_url: Option<&str>,
        frontier_depth: u32,
        full_scan: bool,
    ) -> StorageResult<()> {
        let now = now();
        let full_scan_at = if full_scan { Some(now.as_str()) } else { None };
        let updated = self.conn.execute(
            "UPDATE sources SET frontier_url = ?1, frontier_depth = ?2, last_crawled_at = ?3,
                                last_full_scan_at = COALESCE(?4, last_full_scan_at)
             WHERE id = ?5",
            params![frontier_url, frontier_depth, now, full_scan_at, source_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SourceNotFound(format!("id {}", source_id)));
        }
        Ok(())
    }

    fn update_halted_page(&mut self, source_id: i64, url: Option<&str>) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sources SET halted_url = ?1 WHERE id = ?2",
            params![url, source_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SourceNotFound(format!("id {}", source_id)));
        }
        Ok(())
    }

    // ===== Runs =====

    fn create_run(&mut self, source_id: i64, mode: &str, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_runs (source_id, mode, config_hash, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                source_id,
                mode,
                config_hash,
                now(),
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        stats_json: &str,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2, stats_json = ?3 WHERE id = ?4",
            params![status.to_db_string(), now(), stats_json, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM crawl_runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], row_to_run)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self, source_id: i64) -> StorageResult<Option<RunRecord>> {
        let sql = format!(
            "SELECT {} FROM crawl_runs WHERE source_id = ?1 ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(&sql, params![source_id], row_to_run)
            .optional()?;
        Ok(run)
    }

    // ===== Pages =====

    fn get_page(&self, source_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let page = self
            .conn
            .query_row(
                "SELECT id, source_id, url, fingerprint, first_seen_at, last_seen_at, document_id
                 FROM pages WHERE source_id = ?1 AND url = ?2",
                params![source_id, url],
                row_to_page,
            )
            .optional()?;
        Ok(page)
    }

    fn upsert_page(&mut self, source_id: i64, url: &str, fingerprint: &str) -> StorageResult<i64> {
        let now = now();
        self.conn.execute(
            "INSERT INTO pages (source_id, url, fingerprint, first_seen_at, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(source_id, url) DO UPDATE SET fingerprint = excluded.fingerprint,
                                                       last_seen_at = excluded.last_seen_at",
            params![source_id, url, fingerprint, now],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM pages WHERE source_id = ?1 AND url = ?2",
            params![source_id, url],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn touch_page(&mut self, source_id: i64, url: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET last_seen_at = ?1 WHERE source_id = ?2 AND url = ?3",
            params![now(), source_id, url],
        )?;
        Ok(())
    }

    fn link_page_document(
        &mut self,
        source_id: i64,
        url: &str,
        fingerprint: &str,
        document_id: i64,
    ) -> StorageResult<()> {
        let now = now();
        self.conn.execute(
            "INSERT INTO pages (source_id, url, fingerprint, first_seen_at, last_seen_at, document_id)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)
             ON CONFLICT(source_id, url) DO UPDATE SET fingerprint = excluded.fingerprint,
                                                       last_seen_at = excluded.last_seen_at,
                                                       document_id = excluded.document_id",
            params![source_id, url, fingerprint, now, document_id],
        )?;
        Ok(())
    }

    // ===== Documents =====

    fn get_document(&self, document_id: i64) -> StorageResult<DocumentRecord> {
        self.query_document("id = ?1", &document_id)?
            .ok_or(StorageError::DocumentNotFound(document_id))
    }

    fn family_documents(&self, family_id: i64) -> StorageResult<Vec<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE family_id = ?1 ORDER BY id ASC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let docs = stmt
            .query_map(params![family_id], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    fn latest_in_family(&self, family_id: i64) -> StorageResult<Option<DocumentRecord>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE family_id = ?1 AND is_latest_version = 1
             ORDER BY id DESC LIMIT 1",
            DOCUMENT_COLUMNS
        );
        let doc = self
            .conn
            .query_row(&sql, params![family_id], row_to_document)
            .optional()?;
        Ok(doc)
    }

    fn find_in_family_by_hash(
        &self,
        family_id: i64,
        content_hash: &str,
    ) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE family_id = ?1 AND content_hash = ?2
                 ORDER BY id ASC LIMIT 1",
                params![family_id, content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn sample_family_embeddings(
        &self,
        family_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<Vec<f32>>> {
        let mut stmt = self.conn.prepare(
            "SELECT embedding FROM documents WHERE family_id = ?1 AND embedding IS NOT NULL
             ORDER BY id DESC LIMIT ?2",
        )?;
        let embeddings = stmt
            .query_map(params![family_id, limit as i64], |row| decode_vector(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(embeddings.into_iter().flatten().collect())
    }

    fn add_document_source(
        &mut self,
        document_id: i64,
        url: &str,
        source_id: i64,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO document_sources (document_id, url, source_id, added_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![document_id, url, source_id, now()],
        )?;
        Ok(inserted > 0)
    }

    fn document_sources(&self, document_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM document_sources WHERE document_id = ?1 ORDER BY id")?;
        let urls = stmt
            .query_map(params![document_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    fn commit_admission(&mut self, admission: &VersionAdmission) -> StorageResult<i64> {
        let now = now();
        let doc = &admission.document;
        let embedding = encode_vector(doc.embedding.as_deref())?;
        let centroid = encode_vector(admission.centroid.as_deref())?;

        // Dropping the transaction without commit rolls everything back
        let tx = self.conn.transaction()?;

        let family_exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM families WHERE id = ?1",
                params![admission.family_id],
                |row| row.get(0),
            )
            .optional()?;
        if family_exists.is_none() {
            return Err(StorageError::FamilyNotFound(admission.family_id));
        }

        tx.execute(
            "UPDATE documents SET is_latest_version = 0, updated_at = ?1
             WHERE family_id = ?2 AND is_latest_version = 1",
            params![now, admission.family_id],
        )?;

        tx.execute(
            "INSERT INTO documents (source_id, url, normalized_url, content_hash, title, file_name,
                                    file_type, family_id, version, is_latest_version,
                                    supersedes_id, last_modified_at_source, embedding,
                                    created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11, ?12, ?13, ?13)",
            params![
                doc.source_id,
                doc.url,
                doc.normalized_url,
                doc.content_hash,
                doc.title,
                doc.file_name,
                doc.file_type,
                admission.family_id,
                admission.version,
                admission.supersedes_id,
                doc.last_modified_at_source,
                embedding,
                now,
            ],
        )?;
        let document_id = tx.last_insert_rowid();

        if let Some(previous) = admission.supersedes_id {
            let linked = tx.execute(
                "UPDATE documents SET superseded_by_id = ?1, updated_at = ?2
                 WHERE id = ?3 AND family_id = ?4 AND superseded_by_id IS NULL",
                params![document_id, now, previous, admission.family_id],
            )?;
            if linked != 1 {
                return Err(StorageError::ConstraintViolation(format!(
                    "document {} is not the open tail of family {}",
                    previous, admission.family_id
                )));
            }
        }

        tx.execute(
            "UPDATE families SET centroid = COALESCE(?1, centroid), updated_at = ?2 WHERE id = ?3",
            params![centroid, now, admission.family_id],
        )?;

        tx.commit()?;
        Ok(document_id)
    }

    // ===== Families =====

    fn create_family(&mut self, family: &NewFamily) -> StorageResult<i64> {
        let now = now();
        let centroid = encode_vector(family.centroid.as_deref())?;
        self.conn.execute(
            "INSERT INTO families (canonical_title, category, owner, centroid, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                family.canonical_title,
                family.category,
                family.owner,
                centroid,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_family(&self, family_id: i64) -> StorageResult<FamilyRecord> {
        let sql = format!("SELECT {} FROM families WHERE id = ?1", FAMILY_COLUMNS);
        self.conn
            .query_row(&sql, params![family_id], row_to_family)
            .optional()?
            .ok_or(StorageError::FamilyNotFound(family_id))
    }

    fn find_family_by_canonical_title(&self, title: &str) -> StorageResult<Option<FamilyRecord>> {
        let sql = format!(
            "SELECT {} FROM families WHERE canonical_title = ?1 ORDER BY id ASC LIMIT 1",
            FAMILY_COLUMNS
        );
        let family = self
            .conn
            .query_row(&sql, params![title], row_to_family)
            .optional()?;
        Ok(family)
    }

    fn families_by_category_owner(
        &self,
        category: Option<&str>,
        owner: Option<&str>,
    ) -> StorageResult<Vec<FamilyRecord>> {
        let sql = format!(
            "SELECT {} FROM families WHERE category IS ?1 AND owner IS ?2 ORDER BY id ASC",
            FAMILY_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let families = stmt
            .query_map(params![category, owner], row_to_family)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(families)
    }

    // ===== Statistics =====

    fn corpus_counts(&self) -> StorageResult<CorpusCounts> {
        Ok(CorpusCounts {
            sources: self.count("SELECT COUNT(*) FROM sources")?,
            documents: self.count("SELECT COUNT(*) FROM documents")?,
            latest_documents: self
                .count("SELECT COUNT(*) FROM documents WHERE is_latest_version = 1")?,
            families: self.count("SELECT COUNT(*) FROM families")?,
            provenance_links: self.count("SELECT COUNT(*) FROM document_sources")?,
            pages: self.count("SELECT COUNT(*) FROM pages")?,
            runs: self.count("SELECT COUNT(*) FROM crawl_runs")?,
        })
    }
}
