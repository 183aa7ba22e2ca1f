//! Per-URL fingerprint tracking

use crate::storage::{Storage, StorageResult};
use std::collections::HashMap;

/// Why a page was or was not selected for processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    NewPage,
    Unchanged,
    Changed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeDecision {
    pub process: bool,
    pub reason: ChangeReason,
}

impl ChangeDecision {
    fn new(reason: ChangeReason) -> Self {
        Self {
            process: reason != ChangeReason::Unchanged,
            reason,
        }
    }
}

/// Decides whether a listing page needs re-extraction
///
/// Keeps a per-run cache of fingerprints in front of the page records in
/// the store. A fingerprint is persisted as soon as the decision to process
/// is made, before any extraction runs: an interrupted cycle does not retry
/// the page on resume.
#[derive(Debug, Default)]
pub struct PageChangeTracker {
    fingerprints: HashMap<(i64, String), String>,
}

impl PageChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn stored_fingerprint<S: Storage + ?Sized>(
        &mut self,
        store: &S,
        source_id: i64,
        url: &str,
    ) -> StorageResult<Option<String>> {
        let key = (source_id, url.to_string());
        if let Some(fingerprint) = self.fingerprints.get(&key) {
            return Ok(Some(fingerprint.clone()));
        }
        let stored = store.get_page(source_id, url)?.map(|page| page.fingerprint);
        if let Some(fingerprint) = &stored {
            self.fingerprints.insert(key, fingerprint.clone());
        }
        Ok(stored)
    }

    /// New URL or changed fingerprint: process (and persist now). Same
    /// fingerprint: skip (and bump the page's last-seen time).
    pub fn should_process<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        source_id: i64,
        url: &str,
        fingerprint: &str,
    ) -> StorageResult<ChangeDecision> {
        let decision = match self.stored_fingerprint(store, source_id, url)? {
            None => ChangeDecision::new(ChangeReason::NewPage),
            Some(previous) if previous == fingerprint => {
                ChangeDecision::new(ChangeReason::Unchanged)
            }
            Some(_) => ChangeDecision::new(ChangeReason::Changed),
        };

        if decision.process {
            self.record(store, source_id, url, fingerprint)?;
        } else {
            store.touch_page(source_id, url)?;
        }

        tracing::debug!(url = %url, reason = ?decision.reason, "Page change decision");
        Ok(decision)
    }

    /// True when the store has no record of this page yet
    pub fn is_unseen<S: Storage + ?Sized>(
        &mut self,
        store: &S,
        source_id: i64,
        url: &str,
    ) -> StorageResult<bool> {
        Ok(self.stored_fingerprint(store, source_id, url)?.is_none())
    }

    /// Persists a page fingerprint unconditionally
    pub fn record<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        source_id: i64,
        url: &str,
        fingerprint: &str,
    ) -> StorageResult<()> {
        store.upsert_page(source_id, url, fingerprint)?;
        self.fingerprints
            .insert((source_id, url.to_string()), fingerprint.to_string());
        Ok(())
    }

    /// Records a document URL as a page whose fingerprint is the document's
    /// content hash, linked to the stored document
    pub fn record_document_page<S: Storage + ?Sized>(
        &mut self,
        store: &mut S,
        source_id: i64,
        url: &str,
        content_hash: &str,
        document_id: i64,
    ) -> StorageResult<()> {
        store.link_page_document(source_id, url, content_hash, document_id)?;
        self.fingerprints
            .insert((source_id, url.to_string()), content_hash.to_string());
        Ok(())
    }
}
