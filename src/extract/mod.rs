//! External collaborators consumed by the crawl cycle
//!
//! Text extraction, metadata extraction, and embeddings sit behind traits so
//! OCR pipelines, LLM metadata extractors, or hosted embedding models can be
//! swapped in. The defaults here are deterministic and dependency-free.

mod embedding;
mod metadata;
mod text;

pub use embedding::HashingEmbedder;
pub use metadata::HeuristicMetadataExtractor;
pub use text::PlainTextExtractor;

use crate::sites::FileType;
use thiserror::Error;

/// Errors raised by extraction collaborators
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Document body is empty")]
    EmptyBody,

    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("No text could be extracted: {0}")]
    NoText(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),
}

/// Text pulled out of a document body
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    /// True when the body looks like a scanned image needing OCR
    pub is_scanned: bool,
}

/// Fields used for family clustering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub category: Option<String>,
    pub owner: Option<String>,
}

/// Turns a fetched document body into text
pub trait ContentExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8], file_type: FileType)
        -> Result<ExtractedText, ExtractionError>;
}

/// Derives clustering metadata from document text
pub trait MetadataExtractor: Send + Sync {
    fn extract(
        &self,
        text: &str,
        file_name: Option<&str>,
    ) -> Result<DocumentMetadata, ExtractionError>;
}

/// Opaque text embedding model
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ExtractionError>;
}
