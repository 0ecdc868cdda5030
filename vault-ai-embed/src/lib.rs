//! # vault-ai-embed
//!
//! Text embedding generation for the vault-ai pipeline, built on local ONNX
//! models via FastEmbed. Designed for async operation with a small provider
//! trait so the indexing and retrieval code never depends on a concrete
//! model.
//!
//! ## Features
//!
//! - **Local ONNX Models**: embeddings without external API calls
//! - **Async-First Design**: full async/await support with tokio integration
//! - **Model Caching**: loaded models are cached per process and reused
//! - **Deterministic Output**: identical input text yields identical vectors,
//!   which keeps re-indexing idempotent for unchanged content
//!
//! ## Quick Start
//!
//! ```no_run
//! use vault_ai_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let provider = FastEmbedProvider::create(EmbedConfig::default()).await?;
//!
//! let texts = vec!["Hello world".to_string(), "How are you?".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`config`]: model configuration
//! - [`provider`]: the [`EmbeddingProvider`] trait plus the FastEmbed and
//!   mock implementations
//! - [`error`]: error types and result handling

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::EmbedConfig;
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider, MockEmbeddingProvider};
