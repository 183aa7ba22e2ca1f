//! Family clustering and version admission

use super::canonical::canonical_title;
use crate::config::FamilyConfig;
use crate::extract::EmbeddingProvider;
use crate::identity::content_hash;
use crate::storage::{NewDocument, NewFamily, Storage, StorageResult, VersionAdmission};
use std::sync::Arc;

/// Characters of content fed to the embedding model
const EMBEDDING_INPUT_CHARS: usize = 1000;

/// Family chosen for a document
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyResolution {
    pub family_id: i64,
    pub is_new: bool,
    pub canonical_title: String,
}

/// Result of admitting a document into a family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOutcome {
    /// Stored as the family's new latest version
    Admitted { document_id: i64, version: String },
    /// The family already holds this exact content
    Duplicate { existing_id: i64 },
}

/// Version following `current`
///
/// The first version is "1.0"; afterwards the stored version is parsed as a
/// decimal and bumped by 0.1. A malformed stored version yields "1.1".
pub fn next_version(current: Option<&str>) -> String {
    match current {
        None => "1.0".to_string(),
        Some(version) => match version.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => format!("{:.1}", number + 0.1),
            _ => {
                tracing::warn!(version = %version, "Unparseable version, restarting at 1.1");
                "1.1".to_string()
            }
        },
    }
}

/// Element-wise mean of the vectors sharing the first vector's dimension
pub fn mean_centroid(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dimension = vectors.first()?.len();
    let members: Vec<&Vec<f32>> = vectors.iter().filter(|v| v.len() == dimension).collect();

    let mut centroid = vec![0.0f32; dimension];
    for member in &members {
        for (acc, value) in centroid.iter_mut().zip(member.iter()) {
            *acc += value;
        }
    }
    let count = members.len() as f32;
    for value in centroid.iter_mut() {
        *value /= count;
    }
    Some(centroid)
}

fn embedding_input(content: &str) -> &str {
    match content.char_indices().nth(EMBEDDING_INPUT_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Clusters documents into families and maintains their version chains
pub struct FamilyEngine {
    similarity_threshold: f64,
    centroid_sample_size: usize,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl FamilyEngine {
    pub fn new(config: &FamilyConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            centroid_sample_size: config.centroid_sample_size.max(1),
            embedder,
        }
    }

    /// Embeds the opening of `content`; failures are logged and yield `None`
    pub fn embed(&self, content: &str) -> Option<Vec<f32>> {
        match self.embedder.embed(embedding_input(content)) {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!("Embedding failed, continuing without one: {}", e);
                None
            }
        }
    }

    /// Finds or creates the family for a new document
    ///
    /// An exact canonical-title match wins. Otherwise the most similar
    /// canonical title among families with the same category and owner is
    /// accepted at or above the similarity threshold. Otherwise a new family
    /// is created, its centroid seeded from the content.
    pub fn resolve_family<S: Storage + ?Sized>(
        &self,
        store: &mut S,
        title: &str,
        content: &str,
        category: Option<&str>,
        owner: Option<&str>,
    ) -> StorageResult<FamilyResolution> {
        let canonical = canonical_title(title);

        if let Some(family) = store.find_family_by_canonical_title(&canonical)? {
            return Ok(FamilyResolution {
                family_id: family.id,
                is_new: false,
                canonical_title: canonical,
            });
        }

        let best = store
            .families_by_category_owner(category, owner)?
            .into_iter()
            .map(|family| {
                let ratio = strsim::normalized_levenshtein(&canonical, &family.canonical_title);
                (family, ratio)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        if let Some((family, ratio)) = best {
            if ratio >= self.similarity_threshold {
                tracing::debug!(
                    family_id = family.id,
                    ratio,
                    title = %canonical,
                    "Matched family by title similarity"
                );
                return Ok(FamilyResolution {
                    family_id: family.id,
                    is_new: false,
                    canonical_title: canonical,
                });
            }
        }

        let family_id = store.create_family(&NewFamily {
            canonical_title: canonical.clone(),
            category: category.map(str::to_string),
            owner: owner.map(str::to_string),
            centroid: self.embed(content),
        })?;
        tracing::info!(family_id, title = %canonical, "Created family");

        Ok(FamilyResolution {
            family_id,
            is_new: true,
            canonical_title: canonical,
        })
    }

    /// Admits `document` as the family's new latest version
    ///
    /// Content already present in the family is reported as a duplicate.
    /// Otherwise the new row, the supersession pointers, the latest flags, and
    /// the recomputed centroid are committed in one transaction.
    pub fn admit_version<S: Storage + ?Sized>(
        &self,
        store: &mut S,
        mut document: NewDocument,
        family_id: i64,
        content: &str,
    ) -> StorageResult<VersionOutcome> {
        document.content_hash = content_hash(content);

        if let Some(existing_id) = store.find_in_family_by_hash(family_id, &document.content_hash)? {
            return Ok(VersionOutcome::Duplicate { existing_id });
        }

        let latest = store.latest_in_family(family_id)?;
        let version = next_version(latest.as_ref().map(|doc| doc.version.as_str()));

        if document.embedding.is_none() {
            document.embedding = self.embed(content);
        }

        let mut sample =
            store.sample_family_embeddings(family_id, self.centroid_sample_size.saturating_sub(1))?;
        if let Some(embedding) = &document.embedding {
            sample.insert(0, embedding.clone());
        }

        let admission = VersionAdmission {
            document,
            family_id,
            version: version.clone(),
            supersedes_id: latest.map(|doc| doc.id),
            centroid: mean_centroid(&sample),
        };
        let document_id = store.commit_admission(&admission)?;

        tracing::debug!(family_id, document_id, version = %version, "Admitted version");
        Ok(VersionOutcome::Admitted {
            document_id,
            version,
        })
    }
}
