//! vault-ai-retriever: Incremental vault indexing and retrieval-augmented answering
//!
//! This crate keeps a directory tree of text documents continuously indexed
//! in a vector store and answers natural-language questions over that index
//! by retrieving the most relevant passages and forwarding them to a
//! text-generation backend.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: content hashing, incremental index maintenance,
//!   filesystem watching, and similarity retrieval with snippet assembly
//! - **[`storage`]**: vector store abstraction with an in-memory
//!   implementation
//! - **[`gateway`]**: lock-guarded file-based question/answer handoff
//! - **[`generate`]**: answer generation against an external backend
//! - **[`config`]**: startup configuration
//!
//! ## Architecture
//!
//! ```text
//! Files → IndexManager → EmbeddingProvider → VectorStore
//!   ↑                                            ↓
//! VaultWatcher      QueryGateway → RetrievalEngine → AnswerGenerator
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashSet;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use vault_ai_retriever::retrieval::index_manager::IndexManager;
//! use vault_ai_retriever::storage::memory_store::MemoryVectorStore;
//! use vault_ai_embed::{EmbedConfig, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//! let store = Arc::new(MemoryVectorStore::new());
//! let mut index = IndexManager::new(
//!     PathBuf::from("./vault"),
//!     HashSet::from([".obsidian".to_string()]),
//!     embedder,
//!     store,
//! );
//! let indexed = index.scan_tree().await?;
//! println!("Indexed {indexed} files");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod gateway;
pub mod generate;
pub mod retrieval;
pub mod storage;
