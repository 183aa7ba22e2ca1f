//! Multi-tier document identity resolver
//!
//! Tiers are checked in order, each against the cache first and then the
//! store (populating the cache on a store hit):
//!
//! 1. exact URL, same content hash: skip
//! 2. exact URL, different hash: new version of that document
//! 3. different URL, same content hash: duplicate, record provenance
//! 4. identity-key match (query, fragment, trailing slash, `www.` stripped):
//!    handled like tiers 1–2
//!
//! Anything else is a new document. Store failures count as "not found" for
//! the tier that hit them, so resolution degrades toward creating a document
//! rather than dropping one.

use super::cache::{CachedDocument, IdentityCache};
use super::hash::content_hash;
use crate::storage::{DocumentLookup, DocumentRecord, StorageResult};
use crate::url::identity_key;

/// What to do with an observed (URL, content) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionAction {
    /// Same URL, same content
    SkipUnchanged { existing_id: i64 },

    /// Same URL (or identity key), changed content
    UpdateVersion {
        existing_id: i64,
        old_hash: String,
        new_hash: String,
    },

    /// Known content served from another URL
    LinkDuplicate {
        existing_id: i64,
        existing_url: String,
    },

    /// Nothing known matches
    CreateNew,
}

impl AdmissionAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkipUnchanged { .. } => "skip_unchanged",
            Self::UpdateVersion { .. } => "update_version",
            Self::LinkDuplicate { .. } => "link_duplicate",
            Self::CreateNew => "create_new",
        }
    }
}

/// Resolves observations against the cache and the store
#[derive(Debug)]
pub struct DocumentIdentityResolver {
    cache: IdentityCache,
    lookup_failures: Vec<String>,
}

impl DocumentIdentityResolver {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: IdentityCache::new(cache_capacity),
            lookup_failures: Vec::new(),
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Warms the cache from the store
    pub fn preload<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        source_id: i64,
    ) -> StorageResult<usize> {
        self.cache.preload(lookup, source_id)
    }

    /// Makes a freshly committed document visible to later resolutions
    pub fn remember(&mut self, record: &DocumentRecord) {
        self.cache.remember_record(record);
    }

    /// Lookup failures since the last call, one message per failed tier
    pub fn take_lookup_failures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lookup_failures)
    }

    /// Decides the admission action for `content` observed at `url`
    pub fn resolve<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        url: &str,
        content: &str,
        title: &str,
    ) -> AdmissionAction {
        let hash = content_hash(content);

        let action = self.resolve_hash(lookup, url, &hash);
        tracing::debug!(url = %url, title = %title, action = action.label(), "Identity resolved");
        action
    }

    /// Same as [`resolve`](Self::resolve) for an already computed content hash
    pub fn resolve_hash<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        url: &str,
        hash: &str,
    ) -> AdmissionAction {
        if let Some(existing) = self.by_url(lookup, url) {
            return compare(existing, hash);
        }

        if let Some(existing) = self.by_hash(lookup, hash) {
            if existing.url == url {
                return AdmissionAction::SkipUnchanged {
                    existing_id: existing.id,
                };
            }
            return AdmissionAction::LinkDuplicate {
                existing_id: existing.id,
                existing_url: existing.url,
            };
        }

        match identity_key(url) {
            Ok(key) => {
                if let Some(existing) = self.by_key(lookup, &key) {
                    return compare(existing, hash);
                }
            }
            Err(e) => {
                tracing::debug!(url = %url, "No identity key: {}", e);
            }
        }

        AdmissionAction::CreateNew
    }

    fn record_failure(&mut self, tier: &str, url: &str, error: impl std::fmt::Display) {
        tracing::warn!(url = %url, tier, "Identity lookup failed, treating as not found: {}", error);
        self.lookup_failures
            .push(format!("{} lookup failed: {}", tier, error));
    }

    fn by_url<L: DocumentLookup + ?Sized>(&mut self, lookup: &L, url: &str) -> Option<CachedDocument> {
        if let Some(hit) = self.cache.get_by_url(url) {
            return Some(hit.clone());
        }

        match lookup.find_latest_by_url(url) {
            Ok(Some(record)) => {
                self.cache.remember_record(&record);
                let doc = CachedDocument::from(&record);
                if record.url != url {
                    // Found through an added provenance URL
                    let key = identity_key(url).unwrap_or_else(|_| url.to_string());
                    self.cache.remember(url, &key, doc.clone());
                }
                Some(doc)
            }
            Ok(None) => None,
            Err(e) => {
                self.record_failure("url", url, e);
                None
            }
        }
    }

    fn by_hash<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        hash: &str,
    ) -> Option<CachedDocument> {
        if let Some(hit) = self.cache.get_by_hash(hash) {
            return Some(hit.clone());
        }

        match lookup.find_by_hash(hash) {
            Ok(Some(record)) => {
                self.cache.remember_record(&record);
                Some(CachedDocument::from(&record))
            }
            Ok(None) => None,
            Err(e) => {
                self.record_failure("hash", hash, e);
                None
            }
        }
    }

    fn by_key<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        key: &str,
    ) -> Option<CachedDocument> {
        if let Some(hit) = self.cache.get_by_key(key) {
            return Some(hit.clone());
        }

        match lookup.find_latest_by_normalized_url(key) {
            Ok(Some(record)) => {
                self.cache.remember_record(&record);
                Some(CachedDocument::from(&record))
            }
            Ok(None) => None,
            Err(e) => {
                self.record_failure("identity key", key, e);
                None
            }
        }
    }
}

fn compare(existing: CachedDocument, hash: &str) -> AdmissionAction {
    if existing.content_hash == hash {
        AdmissionAction::SkipUnchanged {
            existing_id: existing.id,
        }
    } else {
        AdmissionAction::UpdateVersion {
            existing_id: existing.id,
            old_hash: existing.content_hash,
            new_hash: hash.to_string(),
        }
    }
}
