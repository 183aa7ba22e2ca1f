//! Document identity resolution
//!
//! Maps each observed (URL, content) pair to an [`AdmissionAction`] relative
//! to the documents already in the store.

mod cache;
mod hash;
mod resolver;

pub use cache::{CachedDocument, IdentityCache};
pub use hash::content_hash;
pub use resolver::{AdmissionAction, DocumentIdentityResolver};
