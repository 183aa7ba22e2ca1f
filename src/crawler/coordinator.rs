//! Crawl cycle orchestration
//!
//! This module contains the loop that runs one crawl cycle over one source:
//! - Choosing the scan mode and recording the run
//! - Walking listing pages in the order the frontier plans them
//! - Deciding per page whether documents need re-extraction
//! - Fetching, resolving, and admitting each discovered document
//! - Persisting the frontier pointer and the run's final stats
//!
//! A cycle never fails as a whole. Every per-item failure becomes an entry in
//! [`CycleStats::errors`] and the walk moves on.

use crate::change::{compute_fingerprint, ChangeReason, PageChangeTracker};
use crate::config::{Config, CrawlerConfig, FamilyConfig, IdentityConfig, SourceConfig};
use crate::crawler::fetcher::{FetchError, Fetcher, HttpFetcher};
use crate::crawler::frontier::{CrawlFrontierManager, PlannedPage};
use crate::extract::{
    ContentExtractor, DocumentMetadata, EmbeddingProvider, HashingEmbedder,
    HeuristicMetadataExtractor, MetadataExtractor, PlainTextExtractor,
};
use crate::family::{FamilyEngine, VersionOutcome};
use crate::identity::{content_hash, AdmissionAction, DocumentIdentityResolver};
use crate::output::{CycleError, CycleStats, ErrorKind};
use crate::sites::{
    clean_text, title_from_file_name, DiscoveredDocument, ParsedPage, ScraperRegistry, SiteScraper,
};
use crate::state::{PageDisposition, ScanMode};
use crate::storage::{NewDocument, RunStatus, SqliteStorage, Storage, StorageResult};
use crate::url::{file_name, identity_key, normalize_url};
use crate::DocketError;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a cycle would do for a source, without fetching anything
#[derive(Debug, Clone, PartialEq)]
pub struct CyclePlan {
    pub source: String,
    pub mode: ScanMode,
    pub window_size: u32,
    pub max_pages: u32,
    pub frontier: Option<(String, u32)>,
}

/// Per-cycle working state
struct CycleContext<'a> {
    source: &'a SourceConfig,
    source_id: i64,
    resolver: DocumentIdentityResolver,
    tracker: PageChangeTracker,
    stats: CycleStats,
}

/// Page record key for a URL
fn page_key(url: &str) -> String {
    normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

/// Wires fetching, scraping, identity resolution, and family admission into
/// crawl cycles over a single store
pub struct Orchestrator<S: Storage> {
    store: S,
    fetcher: Arc<dyn Fetcher>,
    scrapers: ScraperRegistry,
    extractor: Arc<dyn ContentExtractor>,
    metadata: Arc<dyn MetadataExtractor>,
    families: FamilyEngine,
    family_config: FamilyConfig,
    crawler: CrawlerConfig,
    identity: IdentityConfig,
    config_hash: String,
    cancel: CancellationToken,
}

impl<S: Storage + Send> Orchestrator<S> {
    /// Creates an orchestrator with the HTTP fetcher and default collaborators
    pub fn new(store: S, config: &Config, config_hash: &str) -> Result<Self, DocketError> {
        let fetcher = HttpFetcher::new(
            &config.user_agent,
            config.retry.clone(),
            Duration::from_secs(config.crawler.request_timeout_secs),
        )?;

        Ok(Self {
            store,
            fetcher: Arc::new(fetcher),
            scrapers: ScraperRegistry::new(config.crawler.max_next_pages),
            extractor: Arc::new(PlainTextExtractor::new()),
            metadata: Arc::new(HeuristicMetadataExtractor::new()),
            families: FamilyEngine::new(&config.family, Arc::new(HashingEmbedder::default())),
            family_config: config.family.clone(),
            crawler: config.crawler.clone(),
            identity: config.identity.clone(),
            config_hash: config_hash.to_string(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_content_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_metadata_extractor(mut self, metadata: Arc<dyn MetadataExtractor>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.families = FamilyEngine::new(&self.family_config, embedder);
        self
    }

    pub fn with_scrapers(mut self, scrapers: ScraperRegistry) -> Self {
        self.scrapers = scrapers;
        self
    }

    /// Cycles stop cooperatively between pages and documents once the token
    /// is cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Reports the mode, window, budget, and frontier a cycle would use
    pub fn plan_cycle(&self, source: &SourceConfig) -> StorageResult<CyclePlan> {
        let stored = self.store.get_source(&source.name)?;
        let mode = match &stored {
            Some(record) => ScanMode::for_source(record, source.force_full_scan),
            None => ScanMode::Full,
        };
        let frontier = stored
            .filter(|_| !mode.is_full())
            .and_then(|record| record.frontier_url.map(|url| (url, record.frontier_depth)));

        Ok(CyclePlan {
            source: source.name.clone(),
            mode,
            window_size: source.window_size(&self.crawler),
            max_pages: source.max_pages(&self.crawler),
            frontier,
        })
    }

    /// Runs one crawl cycle over `source`
    ///
    /// Always returns a stats summary; failures only show up in its error
    /// list. A cancelled cycle is recorded as interrupted and keeps whatever
    /// it admitted before the cancellation.
    pub async fn run_crawl_cycle(&mut self, source: &SourceConfig) -> CycleStats {
        let record = match self
            .store
            .upsert_source(&source.name, &source.source_type, &source.seed_url)
        {
            Ok(record) => record,
            Err(e) => {
                let mut stats = CycleStats::new(&source.name, ScanMode::Full);
                stats.record_error(CycleError::new(
                    &source.seed_url,
                    ErrorKind::Persistence,
                    format!("Failed to register source: {}", e),
                ));
                return stats;
            }
        };

        let mode = ScanMode::for_source(&record, source.force_full_scan);
        let window_size = source.window_size(&self.crawler);
        let max_pages = source.max_pages(&self.crawler);

        let mut cx = CycleContext {
            source,
            source_id: record.id,
            resolver: DocumentIdentityResolver::new(self.identity.cache_capacity),
            tracker: PageChangeTracker::new(),
            stats: CycleStats::new(&source.name, mode),
        };

        match self
            .store
            .create_run(record.id, mode.to_db_string(), &self.config_hash)
        {
            Ok(run_id) => cx.stats.run_id = Some(run_id),
            Err(e) => cx.stats.record_error(CycleError::new(
                &source.seed_url,
                ErrorKind::Persistence,
                format!("Failed to record crawl run: {}", e),
            )),
        }

        tracing::info!(
            source = %source.name,
            mode = %mode,
            window_size,
            max_pages,
            "Starting crawl cycle"
        );

        if self.identity.preload_cache {
            match cx.resolver.preload(&self.store, record.id) {
                Ok(count) => tracing::debug!(source = %source.name, count, "Preloaded identity cache"),
                Err(e) => tracing::warn!(source = %source.name, "Identity cache preload failed: {}", e),
            }
        }

        let stored_frontier = record
            .frontier_url
            .clone()
            .map(|url| (url, record.frontier_depth));
        let mut frontier = CrawlFrontierManager::new(
            mode,
            &source.seed_url,
            window_size,
            max_pages,
            stored_frontier,
        )
        .with_halted_page(record.halted_url.clone());
        let scraper = self.scrapers.get(&source.source_type);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!(source = %source.name, "Crawl cycle cancelled");
                cx.stats.cancelled = true;
                break;
            }

            let Some(planned) = frontier.next_page() else {
                break;
            };
            self.visit_page(&mut cx, scraper.as_ref(), &mut frontier, planned)
                .await;
        }

        cx.stats.pages_visited = u64::from(frontier.visited());
        let cancelled = cx.stats.cancelled;

        // A clean full walk got past any earlier halt
        let halted_update = match frontier.halted_page() {
            Some(url) => Some(Some(url.to_string())),
            None if mode.is_full() && !cancelled && !frontier.is_halted() => {
                record.halted_url.as_ref().map(|_| None)
            }
            None => None,
        };
        if let Some(halted_url) = halted_update {
            if let Err(e) = self.store.update_halted_page(record.id, halted_url.as_deref()) {
                cx.stats.record_error(CycleError::new(
                    &source.seed_url,
                    ErrorKind::Persistence,
                    format!("Failed to save halted page: {}", e),
                ));
            }
        }

        if let Some((url, depth)) = frontier.finish() {
            let full_scan = mode.is_full() && !cancelled;
            if let Err(e) = self
                .store
                .update_frontier(record.id, Some(&url), depth, full_scan)
            {
                cx.stats.record_error(CycleError::new(
                    &url,
                    ErrorKind::Persistence,
                    format!("Failed to save frontier: {}", e),
                ));
            }
        }

        let mut stats = cx.stats;
        if let Some(run_id) = stats.run_id {
            let status = if cancelled {
                RunStatus::Interrupted
            } else {
                RunStatus::Completed
            };
            if let Err(e) = self.store.finish_run(run_id, status, &stats.to_json()) {
                stats.record_error(CycleError::new(
                    &source.seed_url,
                    ErrorKind::Persistence,
                    format!("Failed to finish crawl run: {}", e),
                ));
            }
        }

        tracing::info!(
            source = %source.name,
            pages = stats.pages_visited,
            changed = stats.pages_changed,
            new = stats.documents_new,
            updated = stats.documents_updated,
            skipped = stats.documents_skipped,
            duplicate = stats.documents_duplicate,
            errors = stats.errors.len(),
            "Crawl cycle finished"
        );

        stats
    }

    /// Fetches one listing page, decides whether to extract from it, and
    /// queues its pagination links
    async fn visit_page(
        &mut self,
        cx: &mut CycleContext<'_>,
        scraper: &dyn SiteScraper,
        frontier: &mut CrawlFrontierManager,
        planned: PlannedPage,
    ) {
        tracing::debug!(
            url = %planned.url,
            depth = planned.depth,
            disposition = %planned.disposition,
            "Visiting listing page"
        );

        let fetched = self.fetcher.fetch(&planned.url).await;
        politeness_delay(self.crawler.politeness_delay_ms).await;

        let resource = match fetched {
            Ok(resource) => resource,
            Err(e) => {
                let exhausted = matches!(e, FetchError::RetriesExhausted { .. });
                cx.stats
                    .record_error(CycleError::new(&planned.url, ErrorKind::Fetch, &e));
                if exhausted {
                    frontier.halt(&planned.url, planned.depth);
                }
                return;
            }
        };

        let page_url = match Url::parse(&resource.url).or_else(|_| Url::parse(&planned.url)) {
            Ok(url) => url,
            Err(e) => {
                cx.stats
                    .record_error(CycleError::new(&planned.url, ErrorKind::Parse, e));
                return;
            }
        };
        let page = ParsedPage::new(page_url, resource.text());
        let fingerprint = compute_fingerprint(&page.body);

        let process = self.page_needs_processing(cx, &planned, &fingerprint);

        let next_pages = scraper.discover_next_pages(&page);
        let queued = frontier.enqueue(&next_pages, planned.depth);
        tracing::debug!(url = %planned.url, found = next_pages.len(), queued, "Pagination links");

        // Unchanged window pages still re-check their documents by content hash
        if !process && !planned.disposition.is_window() {
            return;
        }

        let documents = scraper.discover_documents(&page);
        if documents.is_empty() {
            if process {
                cx.stats.record_error(CycleError::new(
                    &planned.url,
                    ErrorKind::Parse,
                    "No document links matched on the page",
                ));
            }
            return;
        }
        if !process {
            tracing::debug!(
                url = %planned.url,
                documents = documents.len(),
                "Re-checking documents on unchanged page"
            );
        }

        cx.stats.documents_discovered += documents.len() as u64;
        for document in &documents {
            if self.cancel.is_cancelled() {
                cx.stats.cancelled = true;
                return;
            }
            if let Err(e) = self.process_document(cx, document).await {
                cx.stats.record_error(e);
            }
        }
    }

    /// Applies the page's disposition against the stored fingerprint
    ///
    /// Store failures fall back to processing the page.
    fn page_needs_processing(
        &mut self,
        cx: &mut CycleContext<'_>,
        planned: &PlannedPage,
        fingerprint: &str,
    ) -> bool {
        let key = page_key(&planned.url);

        let decision = match planned.disposition {
            PageDisposition::Always | PageDisposition::CheckFingerprint => cx
                .tracker
                .should_process(&mut self.store, cx.source_id, &key, fingerprint)
                .map(|decision| {
                    let changed = decision.reason != ChangeReason::Unchanged;
                    let process = planned.disposition == PageDisposition::Always || decision.process;
                    (process, changed)
                }),
            PageDisposition::OnlyIfUnseen => {
                match cx.tracker.is_unseen(&self.store, cx.source_id, &key) {
                    Ok(true) => cx
                        .tracker
                        .record(&mut self.store, cx.source_id, &key, fingerprint)
                        .map(|_| (true, true)),
                    Ok(false) => self
                        .store
                        .touch_page(cx.source_id, &key)
                        .map(|_| (false, false)),
                    Err(e) => Err(e),
                }
            }
        };

        match decision {
            Ok((process, changed)) => {
                if changed {
                    cx.stats.pages_changed += 1;
                }
                if !process {
                    tracing::debug!(url = %planned.url, "Page unchanged");
                }
                process
            }
            Err(e) => {
                cx.stats.record_error(CycleError::new(
                    &planned.url,
                    ErrorKind::Persistence,
                    format!("Page record unavailable, processing anyway: {}", e),
                ));
                true
            }
        }
    }

    /// Fetches, resolves, and admits one discovered document
    async fn process_document(
        &mut self,
        cx: &mut CycleContext<'_>,
        document: &DiscoveredDocument,
    ) -> Result<(), CycleError> {
        let url = document.url.as_str();
        let persistence = |e: crate::storage::StorageError| {
            CycleError::new(url, ErrorKind::Persistence, e)
        };

        let fetched = self.fetcher.fetch(url).await;
        politeness_delay(self.crawler.politeness_delay_ms).await;
        let resource = fetched.map_err(|e| CycleError::new(url, ErrorKind::Fetch, e))?;

        let extracted = self
            .extractor
            .extract_text(&resource.body, document.file_type)
            .map_err(|e| CycleError::new(url, ErrorKind::Extraction, e))?;
        if extracted.is_scanned {
            tracing::debug!(url = %url, "Document looks scanned; text may need OCR");
        }
        let text = extracted.text;
        let hash = content_hash(&text);

        let action = cx.resolver.resolve(&self.store, url, &text, &document.title);
        for failure in cx.resolver.take_lookup_failures() {
            cx.stats
                .record_error(CycleError::new(url, ErrorKind::IdentityLookup, failure));
        }
        tracing::debug!(url = %url, action = ?action, "Admission action");

        let admitted = match action {
            AdmissionAction::SkipUnchanged { existing_id } => {
                cx.stats.documents_skipped += 1;
                existing_id
            }
            AdmissionAction::LinkDuplicate {
                existing_id,
                existing_url,
            } => {
                let added = self
                    .store
                    .add_document_source(existing_id, url, cx.source_id)
                    .map_err(persistence)?;
                tracing::debug!(url = %url, existing = %existing_url, added, "Recorded duplicate source");
                cx.stats.documents_duplicate += 1;
                existing_id
            }
            AdmissionAction::UpdateVersion { existing_id, .. } => {
                let existing = self.store.get_document(existing_id).map_err(persistence)?;
                let listed = clean_text(&document.title);
                let title = if listed.is_empty() { existing.title } else { listed };
                let new_document =
                    self.new_document(cx.source_id, document, &title, &resource.last_modified);
                let outcome = self
                    .families
                    .admit_version(&mut self.store, new_document, existing.family_id, &text)
                    .map_err(persistence)?;
                match outcome {
                    VersionOutcome::Admitted {
                        document_id,
                        version,
                    } => {
                        tracing::info!(url = %url, document_id, version = %version, "New version admitted");
                        cx.stats.documents_updated += 1;
                        document_id
                    }
                    VersionOutcome::Duplicate { existing_id } => {
                        tracing::debug!(url = %url, existing_id, "Content reverted to an earlier version");
                        cx.stats.documents_duplicate += 1;
                        existing_id
                    }
                }
            }
            AdmissionAction::CreateNew => {
                let metadata = match self.metadata.extract(&text, file_name_of(url).as_deref()) {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        tracing::warn!(url = %url, "Metadata extraction failed: {}", e);
                        DocumentMetadata::default()
                    }
                };
                let title = document_title(document, &metadata);
                let category = metadata.category.or_else(|| cx.source.category.clone());
                let owner = metadata.owner.or_else(|| cx.source.owner.clone());

                let family = self
                    .families
                    .resolve_family(
                        &mut self.store,
                        &title,
                        &text,
                        category.as_deref(),
                        owner.as_deref(),
                    )
                    .map_err(persistence)?;
                if family.is_new {
                    cx.stats.families_created += 1;
                }

                let new_document =
                    self.new_document(cx.source_id, document, &title, &resource.last_modified);
                let outcome = self
                    .families
                    .admit_version(&mut self.store, new_document, family.family_id, &text)
                    .map_err(persistence)?;
                match outcome {
                    VersionOutcome::Admitted { document_id, .. } => {
                        tracing::info!(url = %url, document_id, family_id = family.family_id, "New document admitted");
                        cx.stats.documents_new += 1;
                        document_id
                    }
                    VersionOutcome::Duplicate { existing_id } => {
                        self.store
                            .add_document_source(existing_id, url, cx.source_id)
                            .map_err(persistence)?;
                        cx.stats.documents_duplicate += 1;
                        existing_id
                    }
                }
            }
        };

        let record = self.store.get_document(admitted).map_err(persistence)?;
        cx.resolver.remember(&record);
        cx.tracker
            .record_document_page(&mut self.store, cx.source_id, &page_key(url), &hash, admitted)
            .map_err(persistence)?;

        Ok(())
    }

    fn new_document(
        &self,
        source_id: i64,
        document: &DiscoveredDocument,
        title: &str,
        last_modified: &Option<String>,
    ) -> NewDocument {
        NewDocument {
            source_id,
            url: document.url.clone(),
            normalized_url: identity_key(&document.url).unwrap_or_else(|_| document.url.clone()),
            content_hash: String::new(),
            title: title.to_string(),
            file_name: file_name_of(&document.url),
            file_type: document.file_type.as_str().to_string(),
            last_modified_at_source: last_modified.clone(),
            embedding: None,
        }
    }
}

/// Pause after every page or document fetch
async fn politeness_delay(delay_ms: u64) {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
}

fn file_name_of(url: &str) -> Option<String> {
    Url::parse(url).ok().and_then(|u| file_name(&u))
}

/// Listing title, else extracted title, else a title built from the file name
fn document_title(document: &DiscoveredDocument, metadata: &DocumentMetadata) -> String {
    let listed = clean_text(&document.title);
    if !listed.is_empty() {
        return listed;
    }
    if let Some(title) = metadata.title.as_deref().map(clean_text).filter(|t| !t.is_empty()) {
        return title;
    }
    Url::parse(&document.url)
        .ok()
        .and_then(|url| title_from_file_name(&url))
        .unwrap_or_else(|| document.url.clone())
}

/// Opens the configured store and runs one cycle over `source`
///
/// Setup failures (opening the database, building the HTTP clients) are
/// returned as errors; once the cycle starts it always yields stats.
///
/// # Example
///
/// ```no_run
/// use docket::config::load_config_with_hash;
/// use docket::crawler::run_crawl_cycle;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("docket.toml"))?;
/// for source in &config.sources {
///     let stats = run_crawl_cycle(&config, &hash, source, CancellationToken::new()).await?;
///     println!("{}: {} new", stats.source, stats.documents_new);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl_cycle(
    config: &Config,
    config_hash: &str,
    source: &SourceConfig,
    cancel: CancellationToken,
) -> Result<CycleStats, DocketError> {
    let store = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let mut orchestrator =
        Orchestrator::new(store, config, config_hash)?.with_cancellation(cancel);
    Ok(orchestrator.run_crawl_cycle(source).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::fetcher::FetchedResource;
    use crate::storage::DocumentLookup;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const CONFIG: &str = r#"
[crawler]
window-size = 2
max-pages = 10
politeness-delay-ms = 0

[retry]
max-attempts = 1
base-delay-ms = 1
max-delay-ms = 1

[user-agent]
identities = ["DocketTest/1.0"]

[output]
database-path = ":memory:"

[[source]]
name = "notices"
seed-url = "https://example.gov/notices"
"#;

    /// Serves fixed bodies by URL; anything else is a 404
    #[derive(Default)]
    struct StaticFetcher {
        bodies: Mutex<HashMap<String, String>>,
        down: Mutex<Vec<String>>,
        requests: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn set(&self, url: &str, body: &str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(url.to_string(), body.to_string());
        }

        /// Makes `url` exhaust its retries on every fetch
        fn take_down(&self, url: &str) {
            self.down.lock().unwrap().push(url.to_string());
        }

        fn take_requests(&self) -> Vec<String> {
            std::mem::take(&mut *self.requests.lock().unwrap())
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if self.down.lock().unwrap().iter().any(|u| u == url) {
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: 1,
                    last_error: "connection refused".to_string(),
                });
            }
            let body = self.bodies.lock().unwrap().get(url).cloned();
            match body {
                Some(body) => Ok(FetchedResource {
                    url: url.to_string(),
                    status: 200,
                    content_type: None,
                    last_modified: None,
                    body: body.into_bytes(),
                }),
                None => Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn setup() -> (Orchestrator<SqliteStorage>, Arc<StaticFetcher>, SourceConfig) {
        let config = parse_config(CONFIG).unwrap();
        let fetcher = Arc::new(StaticFetcher::default());
        let orchestrator = Orchestrator::new(SqliteStorage::new_in_memory().unwrap(), &config, "hash")
            .unwrap()
            .with_fetcher(fetcher.clone());
        (orchestrator, fetcher, config.sources[0].clone())
    }

    const LISTING: &str = r#"<html><body><main>
        <a href="/files/fisheries.pdf">Inland fisheries licensing rules</a>
        <a href="/files/roads.pdf">Rural road maintenance budget</a>
    </main></body></html>"#;

    #[tokio::test]
    async fn test_first_cycle_admits_documents() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        fetcher.set("https://example.gov/files/fisheries.pdf", "Licences for inland fishing.");
        fetcher.set("https://example.gov/files/roads.pdf", "Budget for rural roads.");

        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(stats.mode, "full");
        assert_eq!(stats.pages_visited, 1);
        assert_eq!(stats.pages_changed, 1);
        assert_eq!(stats.documents_discovered, 2);
        assert_eq!(stats.documents_new, 2);
        assert_eq!(stats.families_created, 2);
        assert!(stats.errors.is_empty(), "{:?}", stats.errors);

        let run = orchestrator.store().get_run(stats.run_id.unwrap()).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.mode, "full");
    }

    #[tokio::test]
    async fn test_document_errors_do_not_abort_cycle() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        fetcher.set("https://example.gov/files/roads.pdf", "Budget for rural roads.");

        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(stats.documents_new, 1);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].kind, ErrorKind::Fetch);
        assert_eq!(stats.errors[0].url, "https://example.gov/files/fisheries.pdf");
    }

    #[tokio::test]
    async fn test_page_without_documents_is_a_parse_error() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", "<html><body><p>Nothing yet</p></body></html>");

        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(stats.error_count(ErrorKind::Parse), 1);
        assert_eq!(stats.documents_discovered, 0);
    }

    #[tokio::test]
    async fn test_same_content_at_new_url_links_duplicate() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        fetcher.set("https://example.gov/files/fisheries.pdf", "Licences for inland fishing.");
        fetcher.set("https://example.gov/files/roads.pdf", "Licences for inland fishing.");

        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(stats.documents_new, 1);
        assert_eq!(stats.documents_duplicate, 1);

        let counts = orchestrator.store().corpus_counts().unwrap();
        assert_eq!(counts.documents, 1);
        assert_eq!(counts.provenance_links, 1);
    }

    #[tokio::test]
    async fn test_cancelled_cycle_is_interrupted() {
        let (orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut orchestrator = orchestrator.with_cancellation(cancel);

        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert!(stats.cancelled);
        assert_eq!(stats.pages_visited, 0);

        let run = orchestrator.store().get_run(stats.run_id.unwrap()).unwrap();
        assert_eq!(run.status, RunStatus::Interrupted);
        // Nothing reached, so the source still counts as never crawled
        let plan = orchestrator.plan_cycle(&source).unwrap();
        assert_eq!(plan.mode, ScanMode::Full);
    }

    #[tokio::test]
    async fn test_plan_after_first_cycle_is_incremental() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        fetcher.set("https://example.gov/files/fisheries.pdf", "Licences for inland fishing.");
        fetcher.set("https://example.gov/files/roads.pdf", "Budget for rural roads.");
        orchestrator.run_crawl_cycle(&source).await;

        let plan = orchestrator.plan_cycle(&source).unwrap();
        assert_eq!(plan.mode, ScanMode::Incremental);
        assert_eq!(plan.window_size, 2);
        assert_eq!(
            plan.frontier,
            Some(("https://example.gov/notices".to_string(), 1))
        );

        let forced = SourceConfig {
            force_full_scan: true,
            ..source
        };
        assert_eq!(orchestrator.plan_cycle(&forced).unwrap().mode, ScanMode::Full);
    }

    #[tokio::test]
    async fn test_changed_document_on_unchanged_page_is_versioned() {
        let (mut orchestrator, fetcher, source) = setup();
        fetcher.set("https://example.gov/notices", LISTING);
        fetcher.set("https://example.gov/files/fisheries.pdf", "Fish catch rose by four percent.");
        fetcher.set("https://example.gov/files/roads.pdf", "Budget for rural roads.");
        orchestrator.run_crawl_cycle(&source).await;

        fetcher.set("https://example.gov/files/fisheries.pdf", "Fish catch rose by six percent.");
        let stats = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(stats.mode, "incremental");
        assert_eq!(stats.pages_changed, 0);
        assert_eq!(stats.documents_updated, 1);
        assert_eq!(stats.documents_skipped, 1);
        assert_eq!(stats.documents_new, 0);
        assert!(stats.errors.is_empty(), "{:?}", stats.errors);

        let latest = orchestrator
            .store()
            .find_latest_by_url("https://example.gov/files/fisheries.pdf")
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, "1.1");
    }

    #[tokio::test]
    async fn test_unreachable_page_beyond_window_is_not_retried() {
        let (mut orchestrator, fetcher, source) = setup();
        let subjects = [
            "Inland fisheries licensing rules",
            "Rural road maintenance budget",
            "School admission schedule",
        ];
        for (n, subject) in subjects.iter().enumerate() {
            let n = n + 1;
            let url = if n == 1 {
                "https://example.gov/notices".to_string()
            } else {
                format!("https://example.gov/notices?page={}", n)
            };
            let body = format!(
                r#"<html><body><main><a href="/files/notice-{n}.pdf">{subject}</a></main>
                <a rel="next" href="/notices?page={next}">Next</a></body></html>"#,
                n = n,
                subject = subject,
                next = n + 1
            );
            fetcher.set(&url, &body);
            fetcher.set(&format!("https://example.gov/files/notice-{}.pdf", n), subject);
        }
        fetcher.take_down("https://example.gov/notices?page=4");

        let first = orchestrator.run_crawl_cycle(&source).await;
        assert_eq!(first.documents_new, 3);
        assert_eq!(first.error_count(ErrorKind::Fetch), 1);
        fetcher.take_requests();

        for _ in 0..2 {
            let stats = orchestrator.run_crawl_cycle(&source).await;
            assert_eq!(stats.mode, "incremental");
            assert!(stats.errors.is_empty(), "{:?}", stats.errors);
            let requests = fetcher.take_requests();
            assert!(!requests.contains(&"https://example.gov/notices?page=4".to_string()));
            assert!(requests.contains(&"https://example.gov/notices?page=3".to_string()));
        }

        let record = orchestrator.store().get_source("notices").unwrap().unwrap();
        assert_eq!(
            record.halted_url.as_deref(),
            Some("https://example.gov/notices?page=4")
        );
        assert_eq!(record.frontier_url.as_deref(), Some("https://example.gov/notices?page=3"));
        assert_eq!(record.frontier_depth, 3);
    }

    #[test]
    fn test_document_title_fallbacks() {
        let document = DiscoveredDocument {
            url: "https://example.gov/files/water_tariff_order.pdf".to_string(),
            title: "  ".to_string(),
            file_type: crate::sites::FileType::Pdf,
            context: None,
        };
        let from_metadata = DocumentMetadata {
            title: Some("Water Tariff Order".to_string()),
            ..Default::default()
        };
        assert_eq!(document_title(&document, &from_metadata), "Water Tariff Order");
        assert_eq!(
            document_title(&document, &DocumentMetadata::default()),
            "water tariff order"
        );
    }
}
