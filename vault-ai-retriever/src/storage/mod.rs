//! Storage abstraction layer for vault-ai-retriever
//!
//! This module provides a trait-based abstraction for storing document
//! embeddings and running nearest-neighbor queries over them. It separates
//! the storage concern from indexing and retrieval logic, allowing for
//! different backends while maintaining a consistent API.
//!
//! ## Key Components
//!
//! - **VectorStore**: upsert-by-id and k-NN query operations
//! - **Data Types**: IndexedDocument, DocumentMetadata, SimilarityMatch
//!
//! ## Distance semantics
//!
//! Queries report **cosine distance**, defined as `1 - cosine similarity`.
//! Lower values mean more similar; results are ordered ascending. Callers
//! must not treat the reported value as a similarity score.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub mod memory_store;

/// Where an indexed document came from on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentMetadata {
    /// Absolute path of the source file
    pub file_path: PathBuf,
    /// Path relative to the vault root
    pub relative_path: String,
    /// Base name of the source file
    pub file_name: String,
}

/// A document held in the vector store: the embedded composite text, its
/// embedding, and the source-file metadata.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    /// Store key. Derived from the file base name, so two same-named files in
    /// different directories overwrite each other. Kept for compatibility
    /// with existing index consumers; a path-derived key would avoid the
    /// collision.
    pub id: String,
    /// The composite text that was embedded
    pub content: String,
    /// Embedding of `content`
    pub embedding: Vec<f32>,
    pub metadata: DocumentMetadata,
}

/// One result of a k-NN query. See module docs for distance semantics.
#[derive(Debug, Clone)]
pub struct SimilarityMatch {
    pub id: String,
    pub metadata: DocumentMetadata,
    pub content: String,
    /// Cosine distance to the query embedding (lower = more similar)
    pub distance: f32,
}

/// Vector storage operations. See module docs for distance semantics.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the document stored under `document.id`
    async fn upsert(&self, document: IndexedDocument) -> Result<()>;

    /// Return up to `k` stored documents nearest to `embedding`, ordered by
    /// ascending cosine distance. An empty store yields an empty vec.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarityMatch>>;

    /// Number of documents currently stored
    async fn len(&self) -> usize;
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm (or mismatched/empty
/// dimensions), so callers never see NaN from degenerate inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
