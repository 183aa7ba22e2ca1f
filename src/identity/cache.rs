//! Process-local identity cache
//!
//! Advisory only: a miss always falls through to the store, and the cache is
//! dropped with the crawl run that owns it.

use crate::storage::{DocumentLookup, DocumentRecord, StorageResult};
use std::collections::HashMap;

/// The fields identity resolution needs from a stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    pub id: i64,
    pub url: String,
    pub content_hash: String,
}

impl From<&DocumentRecord> for CachedDocument {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            id: record.id,
            url: record.url.clone(),
            content_hash: record.content_hash.clone(),
        }
    }
}

/// URL, content-hash, and identity-key maps over known documents
#[derive(Debug)]
pub struct IdentityCache {
    by_url: HashMap<String, CachedDocument>,
    by_hash: HashMap<String, CachedDocument>,
    by_key: HashMap<String, CachedDocument>,
    capacity: usize,
}

impl IdentityCache {
    /// Creates an empty cache holding at most `capacity` URLs
    pub fn new(capacity: usize) -> Self {
        Self {
            by_url: HashMap::new(),
            by_hash: HashMap::new(),
            by_key: HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    fn full(&self) -> bool {
        self.by_url.len() >= self.capacity
    }

    /// Records the latest document observed at `url`
    ///
    /// Newer entries replace older ones for the same URL or key; the hash map
    /// keeps the first document seen with a given hash. Once full, new URLs
    /// are not cached.
    pub fn remember(&mut self, url: &str, identity_key: &str, doc: CachedDocument) {
        if self.full() && !self.by_url.contains_key(url) {
            return;
        }
        self.by_hash
            .entry(doc.content_hash.clone())
            .or_insert_with(|| doc.clone());
        self.by_key.insert(identity_key.to_string(), doc.clone());
        self.by_url.insert(url.to_string(), doc);
    }

    pub fn remember_record(&mut self, record: &DocumentRecord) {
        self.remember(&record.url, &record.normalized_url, CachedDocument::from(record));
    }

    pub fn get_by_url(&self, url: &str) -> Option<&CachedDocument> {
        self.by_url.get(url)
    }

    pub fn get_by_hash(&self, content_hash: &str) -> Option<&CachedDocument> {
        self.by_hash.get(content_hash)
    }

    pub fn get_by_key(&self, identity_key: &str) -> Option<&CachedDocument> {
        self.by_key.get(identity_key)
    }

    /// Warms the cache with a source's most recent latest versions
    ///
    /// Returns the number of documents loaded.
    pub fn preload<L: DocumentLookup + ?Sized>(
        &mut self,
        lookup: &L,
        source_id: i64,
    ) -> StorageResult<usize> {
        let limit = self.capacity.saturating_sub(self.len());
        let records = lookup.recent_documents(source_id, limit)?;
        // Oldest first so newer versions win on shared keys
        for record in records.iter().rev() {
            self.remember_record(record);
        }
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: i64, url: &str, hash: &str) -> CachedDocument {
        CachedDocument {
            id,
            url: url.to_string(),
            content_hash: hash.to_string(),
        }
    }

    #[test]
    fn test_remember_and_lookup() {
        let mut cache = IdentityCache::new(10);
        cache.remember("https://a.gov/x.pdf", "https://a.gov/x.pdf", doc(1, "https://a.gov/x.pdf", "h1"));
        cache.remember("https://a.gov/x.pdf", "https://a.gov/x.pdf", doc(2, "https://a.gov/x.pdf", "h2"));

        assert_eq!(cache.get_by_url("https://a.gov/x.pdf").unwrap().id, 2);
        assert_eq!(cache.get_by_hash("h1").unwrap().id, 1);
        assert_eq!(cache.get_by_hash("h2").unwrap().id, 2);
        assert_eq!(cache.get_by_key("https://a.gov/x.pdf").unwrap().id, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_capacity_bound() {
        let mut cache = IdentityCache::new(1);
        cache.remember("a", "a", doc(1, "a", "h1"));
        cache.remember("b", "b", doc(2, "b", "h2"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get_by_url("b").is_none());

        // Existing URLs still refresh
        cache.remember("a", "a", doc(3, "a", "h3"));
        assert_eq!(cache.get_by_url("a").unwrap().id, 3);
    }
}
