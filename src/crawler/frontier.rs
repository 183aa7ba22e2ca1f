//! Sliding-window crawl frontier
//!
//! This module plans the walk over a source's listing pages:
//! - Full scans walk from the seed and process every page
//! - Incremental scans re-visit the first W pages (phase A), then jump to the
//!   stored frontier pointer and continue into pages not seen before (phase B)
//! - Every walk is bounded by the per-cycle page budget
//! - A page beyond the window that exhausted its retries is skipped by later
//!   incremental walks, so the frontier never loops back to it
//!
//! The walk is breadth-first over pagination links. Listings are usually
//! newest-first, so page depth approximates age.

use crate::state::{PageDisposition, ScanMode};
use crate::url::normalize_url;
use std::collections::{HashSet, VecDeque};

/// A listing page handed to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPage {
    pub url: String,
    /// 1-based walk position (the seed is depth 1)
    pub depth: u32,
    pub disposition: PageDisposition,
}

/// Plans one cycle's walk over a source
#[derive(Debug)]
pub struct CrawlFrontierManager {
    mode: ScanMode,
    window_size: u32,
    max_pages: u32,

    /// Frontier pointer persisted by the previous cycle
    stored_frontier: Option<(String, u32)>,

    /// Pages waiting to be visited, with their depth
    queue: VecDeque<(String, u32)>,

    /// Dedupe keys of every page visited or queued
    seen: HashSet<String>,

    /// Dedupe key of a page earlier walks could not get past
    skipped: Option<String>,

    visited: u32,
    deepest: Option<(String, u32)>,
    /// `deepest` before the page most recently handed out
    previous_deepest: Option<(String, u32)>,
    phase_b_started: bool,
    halted: bool,
    halted_page: Option<String>,
}

fn page_key(url: &str) -> String {
    normalize_url(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

impl CrawlFrontierManager {
    /// Creates a planner starting at `seed_url`
    ///
    /// `stored_frontier` is the (url, depth) pointer from the previous cycle;
    /// it is ignored on full scans.
    pub fn new(
        mode: ScanMode,
        seed_url: &str,
        window_size: u32,
        max_pages: u32,
        stored_frontier: Option<(String, u32)>,
    ) -> Self {
        let mut manager = Self {
            mode,
            window_size: window_size.max(1),
            max_pages,
            stored_frontier: if mode.is_full() { None } else { stored_frontier },
            queue: VecDeque::new(),
            seen: HashSet::new(),
            skipped: None,
            visited: 0,
            deepest: None,
            previous_deepest: None,
            phase_b_started: false,
            halted: false,
            halted_page: None,
        };
        manager.push(seed_url, 1);
        manager
    }

    /// Skips `halted_url` when it turns up beyond the window
    ///
    /// Full scans ignore it so they can retry the page.
    pub fn with_halted_page(mut self, halted_url: Option<String>) -> Self {
        if !self.mode.is_full() {
            self.skipped = halted_url.as_deref().map(page_key);
        }
        self
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Listing pages handed out so far
    pub fn visited(&self) -> u32 {
        self.visited
    }

    pub fn remaining_budget(&self) -> u32 {
        self.max_pages.saturating_sub(self.visited)
    }

    fn push(&mut self, url: &str, depth: u32) -> bool {
        let key = page_key(url);
        if depth > self.window_size && self.skipped.as_ref() == Some(&key) {
            tracing::debug!(url = %url, depth, "Skipping page that halted an earlier walk");
            return false;
        }
        if self.seen.insert(key) {
            self.queue.push_back((url.to_string(), depth));
            true
        } else {
            false
        }
    }

    /// Jumps to the stored frontier once the window has been re-visited
    fn start_phase_b(&mut self) {
        self.phase_b_started = true;

        let Some((url, depth)) = self.stored_frontier.take() else {
            return;
        };
        if depth <= self.window_size || self.skipped.as_ref() == Some(&page_key(&url)) {
            // Keep following links from the window instead
            return;
        }

        tracing::debug!(frontier = %url, depth, "Resuming beyond the window at the stored frontier");
        self.queue.clear();
        self.seen.insert(page_key(&url));
        self.queue.push_back((url, depth));
    }

    /// Next page to visit, or `None` when the walk is over
    pub fn next_page(&mut self) -> Option<PlannedPage> {
        if self.halted || self.visited >= self.max_pages {
            return None;
        }

        if !self.mode.is_full() && !self.phase_b_started && self.visited >= self.window_size {
            self.start_phase_b();
        }

        let (url, depth) = self.queue.pop_front()?;
        self.visited += 1;

        let disposition = match self.mode {
            ScanMode::Full => PageDisposition::Always,
            ScanMode::Incremental if !self.phase_b_started => PageDisposition::CheckFingerprint,
            ScanMode::Incremental => PageDisposition::OnlyIfUnseen,
        };

        self.previous_deepest = self.deepest.clone();
        self.mark_reached(&url, depth);
        Some(PlannedPage {
            url,
            depth,
            disposition,
        })
    }

    fn mark_reached(&mut self, url: &str, depth: u32) {
        let deeper = match &self.deepest {
            Some((_, deepest)) => depth >= *deepest,
            None => true,
        };
        if deeper {
            self.deepest = Some((url.to_string(), depth));
        }
    }

    /// Queues pagination links found on a page at `parent_depth`
    ///
    /// Returns how many links were new to this walk.
    pub fn enqueue<I, S>(&mut self, links: I, parent_depth: u32) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for link in links {
            if self.push(link.as_ref(), parent_depth + 1) {
                added += 1;
            }
        }
        added
    }

    /// Stops the walk at the page just handed out, which exhausted its retries
    ///
    /// The failed page is not reached. When a page is already queued behind
    /// it, that page becomes the frontier so the next cycle resumes past the
    /// failure. A failed page beyond the window is also reported by
    /// [`halted_page`](Self::halted_page) for later walks to skip.
    pub fn halt(&mut self, url: &str, depth: u32) {
        tracing::warn!(url = %url, depth, "Stopping walk at unreachable page");
        self.halted = true;

        let handed_out = self.deepest.as_ref().is_some_and(|(u, _)| u == url);
        if handed_out {
            self.deepest = self.previous_deepest.take();
        }
        if depth > self.window_size {
            self.halted_page = Some(url.to_string());
        }
        if let Some((next_url, next_depth)) = self.queue.front().cloned() {
            tracing::debug!(url = %next_url, depth = next_depth, "Frontier resumes after the unreachable page");
            self.mark_reached(&next_url, next_depth);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The page beyond the window this walk halted at, if any
    pub fn halted_page(&self) -> Option<&str> {
        self.halted_page.as_deref()
    }

    /// The frontier pointer to persist: the deepest page reached
    ///
    /// An incremental walk that never got past the window keeps the stored
    /// pointer when it is deeper.
    pub fn finish(self) -> Option<(String, u32)> {
        match (self.deepest, self.stored_frontier) {
            (Some(reached), Some(stored)) if stored.1 > reached.1 => Some(stored),
            (None, stored) => stored,
            (reached, _) => reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32) -> String {
        format!("https://example.gov/notices?page={}", n)
    }

    /// Walks a linear listing of `total` pages, returning the visited pages
    fn walk(manager: &mut CrawlFrontierManager, total: u32) -> Vec<PlannedPage> {
        let mut planned = Vec::new();
        while let Some(next) = manager.next_page() {
            let n: u32 = next.url.rsplit('=').next().unwrap().parse().unwrap();
            if n < total {
                manager.enqueue([page(n + 1)], next.depth);
            }
            planned.push(next);
        }
        planned
    }

    #[test]
    fn test_full_scan_walks_everything() {
        let mut manager = CrawlFrontierManager::new(ScanMode::Full, &page(1), 3, 50, None);
        let planned = walk(&mut manager, 10);

        assert_eq!(planned.len(), 10);
        assert!(planned.iter().all(|p| p.disposition == PageDisposition::Always));
        assert_eq!(planned[9].depth, 10);
        assert_eq!(manager.finish(), Some((page(10), 10)));
    }

    #[test]
    fn test_budget_stops_the_walk() {
        let mut manager = CrawlFrontierManager::new(ScanMode::Full, &page(1), 3, 4, None);
        let planned = walk(&mut manager, 10);
        assert_eq!(planned.len(), 4);
        assert_eq!(manager.remaining_budget(), 0);
        assert_eq!(manager.finish(), Some((page(4), 4)));
    }

    #[test]
    fn test_incremental_jumps_to_stored_frontier() {
        let mut manager = CrawlFrontierManager::new(
            ScanMode::Incremental,
            &page(1),
            3,
            50,
            Some((page(10), 10)),
        );
        let planned = walk(&mut manager, 10);

        let urls: Vec<&str> = planned.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec![page(1), page(2), page(3), page(10)]);
        assert!(planned[..3]
            .iter()
            .all(|p| p.disposition == PageDisposition::CheckFingerprint));
        assert_eq!(planned[3].disposition, PageDisposition::OnlyIfUnseen);
        assert_eq!(manager.finish(), Some((page(10), 10)));
    }

    #[test]
    fn test_incremental_advances_past_old_frontier() {
        // Previous cycle stopped at page 6 because of its budget
        let mut manager = CrawlFrontierManager::new(
            ScanMode::Incremental,
            &page(1),
            2,
            5,
            Some((page(6), 6)),
        );
        let planned = walk(&mut manager, 10);

        let depths: Vec<u32> = planned.iter().map(|p| p.depth).collect();
        assert_eq!(depths, vec![1, 2, 6, 7, 8]);
        assert_eq!(manager.finish(), Some((page(8), 8)));
    }

    #[test]
    fn test_frontier_inside_window_continues_queue() {
        let mut manager = CrawlFrontierManager::new(
            ScanMode::Incremental,
            &page(1),
            3,
            50,
            Some((page(2), 2)),
        );
        let planned = walk(&mut manager, 5);

        assert_eq!(planned.len(), 5);
        assert_eq!(planned[3].url, page(4));
        assert_eq!(planned[3].disposition, PageDisposition::OnlyIfUnseen);
    }

    #[test]
    fn test_full_scan_ignores_stored_frontier() {
        let mut manager = CrawlFrontierManager::new(
            ScanMode::Full,
            &page(1),
            2,
            50,
            Some((page(8), 8)),
        );
        let planned = walk(&mut manager, 4);
        assert_eq!(planned.len(), 4);
        assert_eq!(planned[2].url, page(3));
    }

    #[test]
    fn test_enqueue_dedupes_equivalent_urls() {
        let mut manager =
            CrawlFrontierManager::new(ScanMode::Full, "https://example.gov/list", 3, 50, None);
        let first = manager.next_page().unwrap();
        let added = manager.enqueue(
            [
                "https://example.gov/list?page=2",
                "https://EXAMPLE.gov/list?page=2#top",
                "https://example.gov/list",
            ],
            first.depth,
        );
        assert_eq!(added, 1);
    }

    #[test]
    fn test_short_walk_keeps_deeper_stored_frontier() {
        let mut manager = CrawlFrontierManager::new(
            ScanMode::Incremental,
            &page(1),
            3,
            50,
            Some((page(9), 9)),
        );
        let first = manager.next_page().unwrap();
        manager.halt(&first.url, first.depth);
        assert_eq!(manager.finish(), Some((page(9), 9)));
    }

    #[test]
    fn test_halt_inside_window_stops_at_previous_page() {
        let mut manager = CrawlFrontierManager::new(ScanMode::Full, &page(1), 3, 50, None);
        let first = manager.next_page().unwrap();
        manager.enqueue([page(2)], first.depth);
        let second = manager.next_page().unwrap();

        manager.halt(&second.url, second.depth);
        assert!(manager.is_halted());
        assert!(manager.next_page().is_none());
        assert_eq!(manager.halted_page(), None);
        assert_eq!(manager.finish(), Some((page(1), 1)));
    }

    #[test]
    fn test_halt_resumes_at_queued_page() {
        let mut manager = CrawlFrontierManager::new(ScanMode::Full, &page(1), 1, 50, None);
        let first = manager.next_page().unwrap();
        manager.enqueue([page(2), page(3)], first.depth);
        let second = manager.next_page().unwrap();

        manager.halt(&second.url, second.depth);
        assert_eq!(manager.halted_page(), Some(page(2).as_str()));
        assert_eq!(manager.finish(), Some((page(3), 2)));
    }

    /// Walks a linear listing where `failing` always exhausts its retries
    fn walk_with_failure(manager: &mut CrawlFrontierManager, total: u32, failing: u32) -> Vec<String> {
        let mut urls = Vec::new();
        while let Some(next) = manager.next_page() {
            let n: u32 = next.url.rsplit('=').next().unwrap().parse().unwrap();
            urls.push(next.url.clone());
            if n == failing {
                manager.halt(&next.url, next.depth);
                continue;
            }
            if n < total {
                manager.enqueue([page(n + 1)], next.depth);
            }
        }
        urls
    }

    #[test]
    fn test_unreachable_page_is_not_retried_every_cycle() {
        let mut frontier = Some((page(5), 5));
        let mut halted: Option<String> = None;
        let mut cycles = Vec::new();

        for _ in 0..3 {
            let mut manager =
                CrawlFrontierManager::new(ScanMode::Incremental, &page(1), 3, 50, frontier.clone())
                    .with_halted_page(halted.clone());
            cycles.push(walk_with_failure(&mut manager, 10, 5));
            halted = manager.halted_page().map(str::to_string).or(halted);
            frontier = manager.finish();
        }

        assert_eq!(cycles[0], vec![page(1), page(2), page(3), page(5)]);
        assert_eq!(halted, Some(page(5)));
        for later in &cycles[1..] {
            assert_eq!(later, &vec![page(1), page(2), page(3), page(4)]);
        }
        assert_eq!(frontier, Some((page(4), 4)));
    }

    #[test]
    fn test_full_scan_retries_halted_page() {
        let mut manager = CrawlFrontierManager::new(ScanMode::Full, &page(1), 3, 50, None)
            .with_halted_page(Some(page(5)));
        let planned = walk(&mut manager, 6);
        assert_eq!(planned.len(), 6);
        assert_eq!(planned[4].url, page(5));
    }
}
