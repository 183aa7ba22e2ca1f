//! Scan state for a crawl cycle
//!
//! This module provides the small enums that describe how a source is walked
//! in one cycle and what happens to each listing page along the way.
//!
//! # Components
//!
//! - `ScanMode`: full walk from the seed, or sliding-window incremental walk
//! - `PageDisposition`: per-page processing rule for the current walk phase

mod scan_mode;

pub use scan_mode::{PageDisposition, ScanMode};
