//! Filesystem change listener.
//!
//! Bridges notify's callback-style watcher into a bounded channel consumed
//! by a single listener task, decoupling bursty event arrival from
//! processing. The listener serializes all index mutation through the shared
//! [`IndexManager`] lock, so change events never race retrieval reads.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use super::index_manager::IndexManager;

/// Watches the vault root recursively and feeds debounced change events to
/// the index manager.
pub struct VaultWatcher {
    debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    listener: tokio::task::JoinHandle<()>,
}

impl VaultWatcher {
    /// Start watching `root`. Events are debounced to collapse editor save
    /// bursts into a single notification per file.
    pub fn open(
        root: &Path,
        index: Arc<Mutex<IndexManager>>,
        debounce: Duration,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::channel(128);

        // The listener needs to exist before events start flowing
        let listener = tokio::task::spawn(Self::listen(events_rx, index));

        let mut debouncer = notify_debouncer_mini::new_debouncer(
            debounce,
            move |res: notify_debouncer_mini::DebounceEventResult| {
                // Runs on the watcher thread, not in async context
                for ev in res.ok().into_iter().flatten() {
                    if events_tx.blocking_send(ev.path).is_err() {
                        tracing::warn!("Change listener stopped; dropping filesystem event");
                        return;
                    }
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;

        tracing::info!("Monitoring directory for changes: {}", root.display());

        Ok(Self {
            debouncer,
            listener,
        })
    }

    /// Single-consumer event loop; all filtering and digest logic lives in
    /// the index manager so scans and live events share one code path.
    async fn listen(mut events_rx: mpsc::Receiver<PathBuf>, index: Arc<Mutex<IndexManager>>) {
        while let Some(path) = events_rx.recv().await {
            index.lock().await.handle_event(&path).await;
        }
        debug!("Change event channel closed, listener exiting");
    }

    /// Stop the watcher and wait for the listener to drain.
    pub async fn shutdown(self) {
        // Dropping the debouncer stops the watcher thread and releases the
        // last event sender, which ends the listener loop.
        drop(self.debouncer);
        let _ = self.listener.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_store::MemoryVectorStore;
    use crate::storage::VectorStore;
    use std::collections::HashSet;
    use tempfile::tempdir;
    use tokio::time::sleep;
    use tracing_test::traced_test;
    use vault_ai_embed::MockEmbeddingProvider;

    fn shared_manager(
        root: &Path,
    ) -> (Arc<Mutex<IndexManager>>, Arc<MockEmbeddingProvider>, Arc<MemoryVectorStore>) {
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(
            root.to_path_buf(),
            HashSet::from([".obsidian".to_string()]),
            embedder.clone(),
            store.clone(),
        );
        (Arc::new(Mutex::new(manager)), embedder, store)
    }

    /// Drive the listener directly through its channel; no real filesystem
    /// events needed.
    #[traced_test]
    #[tokio::test]
    async fn test_listener_indexes_changed_files() -> Result<()> {
        let dir = tempdir()?;
        let note = dir.path().join("note.md");
        tokio::fs::write(&note, "watched content").await?;

        let (index, _, store) = shared_manager(dir.path());
        let (tx, rx) = mpsc::channel(128);
        let listener = tokio::spawn(VaultWatcher::listen(rx, index));

        tx.send(note.clone()).await?;
        // Directories and untracked paths are ignored without error
        tx.send(dir.path().to_path_buf()).await?;
        tx.send(dir.path().join(".obsidian").join("x.json")).await?;
        drop(tx);

        sleep(Duration::from_millis(50)).await;
        listener.await?;

        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_events_embed_once() -> Result<()> {
        let dir = tempdir()?;
        let note = dir.path().join("note.md");
        tokio::fs::write(&note, "watched content").await?;

        let (index, embedder, _) = shared_manager(dir.path());
        let (tx, rx) = mpsc::channel(128);
        let listener = tokio::spawn(VaultWatcher::listen(rx, index));

        tx.send(note.clone()).await?;
        tx.send(note.clone()).await?;
        tx.send(note).await?;
        drop(tx);
        listener.await?;

        assert_eq!(embedder.call_count(), 1);
        Ok(())
    }
}
