//! Document families and version lineage
//!
//! A family clusters the versions of one logical document. Each admitted
//! version becomes a new document row linked to its predecessor; exactly one
//! member per family is flagged as the latest version.

mod canonical;
mod engine;

pub use canonical::{canonical_title, TITLE_PREFIXES};
pub use engine::{mean_centroid, next_version, FamilyEngine, FamilyResolution, VersionOutcome};
