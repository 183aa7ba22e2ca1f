//! Crawler module for listing walks and crawl cycles
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retries and client-identity rotation
//! - Sliding-window planning of the listing-page walk
//! - Crawl cycle orchestration over one source

mod coordinator;
mod fetcher;
mod frontier;

pub use coordinator::{run_crawl_cycle, CyclePlan, Orchestrator};
pub use fetcher::{
    backoff_delay, build_http_client, FetchError, FetchedResource, Fetcher, HttpFetcher,
};
pub use frontier::{CrawlFrontierManager, PlannedPage};
