//! File-based question/answer handoff.
//!
//! External callers deposit a JSON request file in the plugin directory; the
//! gateway polls for it, answers it through the retrieval engine and the
//! generation backend, and publishes a JSON response file. Advisory file
//! locks (sibling `.lock` files) make the handoff race-free even with
//! concurrent pollers: a request is consumed (read and deleted) under an
//! exclusive lock, so it is processed at most once.
//!
//! ## State machine
//!
//! ```text
//! Idle ──▶ RequestDetected ──▶ RequestConsumed ──▶ Processing ──▶ ResponsePublished
//!  ▲            │ (empty/malformed: not consumed)      │ (failure: dropped)    │
//!  └────────────┴───────────────────────────────────────┴───────────────────────┘
//! ```
//!
//! Each call to [`QueryGateway::poll_once`] drives one full traversal, which
//! keeps every transition testable without the polling loop. Locks are held
//! only for the consume and publish critical sections, never across
//! retrieval or generation work. Lock acquisition failure is the one
//! unrecoverable error: silently continuing after it would risk a duplicate
//! consume.

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::generate::AnswerGenerator;
use crate::retrieval::engine::RetrievalEngine;

/// Name of the transient request file deposited by external callers.
pub const REQUEST_FILE: &str = "rag_question.json";
/// Name of the response file; overwritten for every answered request.
pub const RESPONSE_FILE: &str = "rag_results.json";

/// A question deposited by an external caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

/// Published answer: the original question, generated prose, and the source
/// files in retrieval ranking order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub question: String,
    pub answer: String,
    pub sources: Vec<PathBuf>,
}

/// Result of one gateway poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No request file, or the file was empty
    Idle,
    /// A request file existed but was not consumed (malformed or raced away)
    NotConsumed,
    /// Request consumed but processing failed; no response written
    Dropped,
    /// Response published
    Answered,
}

/// Polls for request files and publishes responses. See module docs for the
/// state machine and locking discipline.
pub struct QueryGateway {
    plugin_dir: PathBuf,
    top_k: usize,
    max_context_chars: usize,
    engine: RetrievalEngine,
    generator: Arc<dyn AnswerGenerator>,
}

impl QueryGateway {
    pub fn new(
        plugin_dir: PathBuf,
        top_k: usize,
        max_context_chars: usize,
        engine: RetrievalEngine,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            plugin_dir,
            top_k,
            max_context_chars,
            engine,
            generator,
        }
    }

    pub fn request_path(&self) -> PathBuf {
        self.plugin_dir.join(REQUEST_FILE)
    }

    pub fn response_path(&self) -> PathBuf {
        self.plugin_dir.join(RESPONSE_FILE)
    }

    /// Acquire the exclusive advisory lock guarding `path`.
    ///
    /// Lock failures are unrecoverable by design and propagate to the serve
    /// loop.
    fn acquire_lock(path: &Path) -> Result<std::fs::File> {
        let lock_path = path.with_extension("json.lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to acquire lock on {}", lock_path.display()))?;
        Ok(file)
    }

    /// Drive one full cycle of the gateway state machine.
    ///
    /// Only lock acquisition errors propagate; every other failure logs,
    /// leaves the gateway healthy, and reports its outcome.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        // Idle → RequestDetected: the request file must exist and be non-empty
        let request_path = self.request_path();
        match std::fs::metadata(&request_path) {
            Ok(metadata) if metadata.len() > 0 => {}
            _ => return Ok(PollOutcome::Idle),
        }

        // RequestDetected → RequestConsumed
        let Some(request) = self.consume_request(&request_path)? else {
            return Ok(PollOutcome::NotConsumed);
        };

        // RequestConsumed → Processing. The request file is already gone; a
        // failure here drops the request and the caller must re-submit.
        let response = match self.process(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error processing question \"{}\": {e:#}", request.question);
                return Ok(PollOutcome::Dropped);
            }
        };

        // Processing → ResponsePublished
        if self.publish(&response)? {
            info!("Published answer for \"{}\"", response.question);
            Ok(PollOutcome::Answered)
        } else {
            Ok(PollOutcome::Dropped)
        }
    }

    /// Read, validate, and delete the request under its lock.
    ///
    /// Malformed requests (unparseable, or missing/empty `question`) are
    /// left in place untouched. A valid request is deleted while the lock is
    /// still held, guaranteeing at most one consumer.
    fn consume_request(&self, request_path: &Path) -> Result<Option<QueryRequest>> {
        let lock = Self::acquire_lock(request_path)?;

        let consumed = (|| {
            let raw = match std::fs::read_to_string(request_path) {
                Ok(raw) => raw,
                Err(e) => {
                    // Another consumer may have won the race
                    warn!("Request file vanished before read: {e}");
                    return None;
                }
            };

            let request: QueryRequest = match serde_json::from_str(&raw) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Malformed request file, leaving in place: {e}");
                    return None;
                }
            };

            if request.question.trim().is_empty() {
                info!("No question found.");
                return None;
            }

            if let Err(e) = std::fs::remove_file(request_path) {
                // Without the delete we cannot guarantee exactly-once
                error!("Failed to consume request file: {e}");
                return None;
            }

            Some(request)
        })();

        lock.unlock()
            .context("Failed to release request lock")?;
        Ok(consumed)
    }

    /// Retrieve context and generate the answer. No locks held here.
    async fn process(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let matches = self.engine.find_similar(&request.question, self.top_k).await?;
        let context = self
            .engine
            .extract_snippets(&matches, &request.question, self.max_context_chars)
            .await?;
        let answer = self.generator.generate(&request.question, &context).await?;

        Ok(QueryResponse {
            question: request.question.clone(),
            answer,
            sources: matches.into_iter().map(|m| m.metadata.file_path).collect(),
        })
    }

    /// Write the response file under its lock, overwriting any prior
    /// response. Returns false (logged) on write failure.
    fn publish(&self, response: &QueryResponse) -> Result<bool> {
        let response_path = self.response_path();
        let lock = Self::acquire_lock(&response_path)?;

        let written = match serde_json::to_string_pretty(response)
            .map_err(anyhow::Error::from)
            .and_then(|json| std::fs::write(&response_path, json).map_err(anyhow::Error::from))
        {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to write response file: {e:#}");
                false
            }
        };

        lock.unlock()
            .context("Failed to release response lock")?;
        Ok(written)
    }
}
