//! Incremental indexing and retrieval.
//!
//! ## Pipeline Flow
//!
//! ```text
//! VaultWatcher ──▶ IndexManager ──▶ EmbeddingProvider ──▶ VectorStore
//!    (events)      (digest gate)                             │
//!                                                            ▼
//!                 RetrievalEngine ◀── query ◀── QueryGateway
//! ```
//!
//! - [`hashing`]: content digests for change detection
//! - [`index_manager`]: path → digest map, embed-and-upsert decisions
//! - [`watcher`]: debounced filesystem events into a bounded channel
//! - [`engine`]: k-NN retrieval and sentence-level snippet assembly

pub mod engine;
pub mod hashing;
pub mod index_manager;
pub mod watcher;
