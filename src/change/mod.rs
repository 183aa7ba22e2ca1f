//! Page-level change detection
//!
//! Listing pages are fingerprinted with their volatile chrome removed, and
//! the fingerprint is compared with the one stored for the page's
//! normalized URL to decide whether the page needs re-extraction.

mod fingerprint;
mod tracker;

pub use fingerprint::compute_fingerprint;
pub use tracker::{ChangeDecision, ChangeReason, PageChangeTracker};
