//! Similarity search and snippet assembly.
//!
//! Two-stage retrieval: a document-level k-NN query against the vector
//! store, then sentence-level re-ranking of each matched document against
//! the query to fit the most relevant sentences into a bounded context
//! window for the answer generator.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;
use vault_ai_embed::EmbeddingProvider;

use crate::storage::{SimilarityMatch, VectorStore, cosine_similarity};

/// Read side of the pipeline: query embedding, k-NN lookup, and snippet
/// extraction. Shares the provider and store with the index manager.
pub struct RetrievalEngine {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Top-`n` documents nearest to `query`, in the store's ranking order
    /// (ascending distance, most similar first). An empty store yields an
    /// empty vec, not an error.
    pub async fn find_similar(&self, query: &str, n: usize) -> Result<Vec<SimilarityMatch>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let query_embedding = self.embedder.embed_text(query).await?;
        let matches = self.store.query(&query_embedding, n).await?;
        debug!("Query matched {} documents", matches.len());
        Ok(matches)
    }

    /// Assemble a bounded context window from the matched documents.
    ///
    /// Each document's text is split into sentence units on `.`, every unit
    /// is scored by cosine similarity to the query embedding, and units are
    /// accepted greedily in descending-similarity order until the next one
    /// would push that document past `max_chars`. Accepted units are joined
    /// with spaces in similarity order, not document order, under a header
    /// naming the file and its relative path. Blocks keep the input match
    /// order and are separated by a blank line.
    pub async fn extract_snippets(
        &self,
        matches: &[SimilarityMatch],
        query: &str,
        max_chars: usize,
    ) -> Result<String> {
        if matches.is_empty() {
            return Ok(String::new());
        }

        let query_embedding = self.embedder.embed_text(query).await?;
        let mut blocks = Vec::with_capacity(matches.len());

        for matched in matches {
            let sentences: Vec<String> = matched
                .content
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();

            let accepted = if sentences.is_empty() {
                Vec::new()
            } else {
                let embedded = self.embedder.embed_texts(&sentences).await?;
                let mut scored: Vec<(usize, f32)> = embedded
                    .embeddings
                    .iter()
                    .map(|embedding| cosine_similarity(embedding, &query_embedding))
                    .enumerate()
                    .collect();
                scored.sort_by(|a, b| b.1.total_cmp(&a.1));

                let mut taken = Vec::new();
                let mut char_count = 0;
                for (idx, _) in scored {
                    let sentence = sentences[idx].as_str();
                    if char_count + sentence.len() <= max_chars {
                        char_count += sentence.len();
                        taken.push(sentence);
                    } else {
                        break;
                    }
                }
                taken
            };

            // A document with nothing under the limit still gets its header
            blocks.push(format!(
                "File: {} (Path: {})\n{}",
                matched.metadata.file_name,
                matched.metadata.relative_path,
                accepted.join(" ")
            ));
        }

        Ok(blocks.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_store::MemoryVectorStore;
    use crate::storage::{DocumentMetadata, IndexedDocument};
    use std::path::PathBuf;
    use vault_ai_embed::MockEmbeddingProvider;

    async fn engine_with_docs(
        docs: &[(&str, &str)],
    ) -> (RetrievalEngine, Arc<MockEmbeddingProvider>) {
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let store = Arc::new(MemoryVectorStore::new());
        for (name, content) in docs {
            let embedding = embedder.embed_text(content).await.unwrap();
            store
                .upsert(IndexedDocument {
                    id: name.to_string(),
                    content: content.to_string(),
                    embedding,
                    metadata: DocumentMetadata {
                        file_path: PathBuf::from(format!("/vault/{name}")),
                        relative_path: name.to_string(),
                        file_name: name.to_string(),
                    },
                })
                .await
                .unwrap();
        }
        (RetrievalEngine::new(embedder.clone(), store), embedder)
    }

    #[tokio::test]
    async fn test_find_similar_orders_nearest_first() -> Result<()> {
        let (engine, _) = engine_with_docs(&[
            ("gardening.md", "compost rotation for raised garden beds"),
            ("rust.md", "rust ownership borrow checker lifetimes notes"),
        ])
        .await;

        let matches = engine.find_similar("rust borrow checker", 2).await?;
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "rust.md");
        assert!(matches[0].distance <= matches[1].distance);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_similar_empty_store() -> Result<()> {
        let (engine, _) = engine_with_docs(&[]).await;
        assert!(engine.find_similar("anything", 5).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_snippets_empty_matches() -> Result<()> {
        let (engine, _) = engine_with_docs(&[]).await;
        let snippets = engine.extract_snippets(&[], "anything", 3000).await?;
        assert_eq!(snippets, "");
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_snippets_header_and_order() -> Result<()> {
        let (engine, _) = engine_with_docs(&[(
            "notes.md",
            "the borrow checker enforces ownership. lunch was soup. \
             ownership rules prevent data races.",
        )])
        .await;

        let matches = engine.find_similar("ownership borrow checker", 1).await?;
        let snippets = engine
            .extract_snippets(&matches, "ownership borrow checker", 3000)
            .await?;

        assert!(snippets.starts_with("File: notes.md (Path: notes.md)\n"));
        // Most relevant sentence first, regardless of document order
        let body = snippets.split_once('\n').unwrap().1;
        let borrow_pos = body.find("borrow checker").unwrap();
        let soup_pos = body.find("lunch was soup").unwrap();
        assert!(borrow_pos < soup_pos);
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_snippets_respects_budget() -> Result<()> {
        // Space-free sentence units so the joined body splits back cleanly
        let content = "alphabetagamma. epsilonzetaeta. iotakappalambda. nuxiomicron.";
        let (engine, _) = engine_with_docs(&[("long.md", content)]).await;

        let matches = engine.find_similar("alphabetagamma", 1).await?;
        let max_chars = 31;
        let snippets = engine
            .extract_snippets(&matches, "alphabetagamma", max_chars)
            .await?;

        let body = snippets.split_once('\n').unwrap().1;
        let accepted: Vec<&str> = body.split(' ').filter(|s| !s.is_empty()).collect();
        let accepted_text_len: usize = accepted.iter().map(|s| s.len()).sum();
        assert!(
            accepted_text_len <= max_chars,
            "accepted {accepted_text_len} chars with budget {max_chars}"
        );
        // The best-scoring unit is always first
        assert_eq!(accepted.first(), Some(&"alphabetagamma"));
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_snippets_zero_budget_emits_bare_header() -> Result<()> {
        let (engine, _) =
            engine_with_docs(&[("tiny.md", "one sentence. another sentence.")]).await;
        let matches = engine.find_similar("sentence", 1).await?;
        let snippets = engine.extract_snippets(&matches, "sentence", 0).await?;

        assert_eq!(snippets, "File: tiny.md (Path: tiny.md)\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_extract_snippets_multiple_documents_keep_match_order() -> Result<()> {
        let (engine, _) = engine_with_docs(&[
            ("first.md", "rust borrow checker notes. ownership rules."),
            ("second.md", "gardening compost notes. raised beds."),
        ])
        .await;

        let matches = engine.find_similar("rust borrow checker", 2).await?;
        let snippets = engine
            .extract_snippets(&matches, "rust borrow checker", 3000)
            .await?;

        let blocks: Vec<&str> = snippets.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("File: first.md"));
        assert!(blocks[1].starts_with("File: second.md"));
        Ok(())
    }
}
