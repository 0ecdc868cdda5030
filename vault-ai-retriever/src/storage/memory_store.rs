//! In-memory vector store with brute-force cosine k-NN.
//!
//! Suitable for vaults up to a few tens of thousands of notes; every query
//! scores all stored embeddings. The index lives for the process lifetime
//! only, which matches the indexer: a restart triggers a full re-scan anyway.

use super::{IndexedDocument, SimilarityMatch, VectorStore, cosine_similarity};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory [`VectorStore`] backed by a `HashMap` keyed by document id.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
    entries: RwLock<HashMap<String, IndexedDocument>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, document: IndexedDocument) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.insert(document.id.clone(), document).is_some() {
            tracing::debug!("Replaced existing store entry");
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<SimilarityMatch>> {
        let entries = self.entries.read().await;

        let mut matches: Vec<SimilarityMatch> = entries
            .values()
            .map(|doc| SimilarityMatch {
                id: doc.id.clone(),
                metadata: doc.metadata.clone(),
                content: doc.content.clone(),
                distance: 1.0 - cosine_similarity(&doc.embedding, embedding),
            })
            .collect();

        // Ascending distance, id as tie-breaker for a stable ranking
        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(k);

        Ok(matches)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
