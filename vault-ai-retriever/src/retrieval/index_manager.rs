//! Incremental index maintenance.
//!
//! The [`IndexManager`] owns the path → digest map and decides which files
//! actually need (re)embedding. Bulk scans and live change notifications go
//! through the same `should_process`/`process` pair, so initial indexing and
//! incremental updates can never diverge.
//!
//! ## Pipeline Flow
//!
//! ```text
//! filesystem change → should_process (digest compare) → process
//!                                                         │
//!                         composite document → embed → VectorStore.upsert
//! ```
//!
//! The digest map lives for the process lifetime only; a restart forces a
//! full re-scan. The efficiency invariant: a no-op re-scan costs O(files)
//! digest computations and zero embedding calls.

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vault_ai_embed::EmbeddingProvider;

use super::hashing;
use crate::storage::{DocumentMetadata, IndexedDocument, VectorStore};

/// Keeps the vector store in sync with the files under the vault root.
///
/// Collaborators are injected at construction; the manager holds the only
/// mutable indexing state (the digest map) and exposes it through its own
/// methods.
pub struct IndexManager {
    vault_root: PathBuf,
    excluded_dirs: HashSet<String>,
    hashes: HashMap<PathBuf, String>,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

impl IndexManager {
    pub fn new(
        vault_root: PathBuf,
        excluded_dirs: HashSet<String>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            vault_root,
            excluded_dirs,
            hashes: HashMap::new(),
            embedder,
            store,
        }
    }

    /// Whether a path is eligible for indexing at all: no hidden-prefixed
    /// segment and no excluded directory name anywhere under the vault root.
    pub fn is_tracked_path(&self, path: &Path) -> bool {
        let relative = path.strip_prefix(&self.vault_root).unwrap_or(path);
        for segment in relative.components() {
            let name = segment.as_os_str().to_string_lossy();
            if name.starts_with('.') || self.excluded_dirs.contains(name.as_ref()) {
                return false;
            }
        }
        true
    }

    /// Decide whether `path` needs (re)embedding, recording its digest.
    ///
    /// Returns false for untracked paths, unchanged content, and unreadable
    /// files; read failures are logged and never propagate. Recording the
    /// digest up front means a file that later fails to decode is not
    /// retried until its content changes again.
    pub async fn should_process(&mut self, path: &Path) -> bool {
        if !self.is_tracked_path(path) {
            return false;
        }

        match hashing::hash_file(path).await {
            Ok(digest) => match self.hashes.get(path) {
                Some(previous) if *previous == digest => false,
                _ => {
                    self.hashes.insert(path.to_path_buf(), digest);
                    true
                }
            },
            Err(e) => {
                warn!("Error accessing file {}: {e}", path.display());
                false
            }
        }
    }

    /// Embed `path` and upsert it into the vector store.
    ///
    /// The embedded text is a composite of file name, path relative to the
    /// vault root, and raw content, so retrieval can match on filename and
    /// path tokens as well as body text. The store key is the file base name
    /// (see [`IndexedDocument::id`](crate::storage::IndexedDocument) for the
    /// collision caveat).
    pub async fn process(&mut self, path: &Path) -> Result<()> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let relative_path = path
            .strip_prefix(&self.vault_root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();

        let combined_content =
            format!("File Name: {file_name}\nRelative Path: {relative_path}\nContent: {content}");

        let embedding = self.embedder.embed_text(&combined_content).await?;

        self.store
            .upsert(IndexedDocument {
                id: file_name.clone(),
                content: combined_content,
                embedding,
                metadata: DocumentMetadata {
                    file_path: path.to_path_buf(),
                    relative_path,
                    file_name: file_name.clone(),
                },
            })
            .await?;

        info!("Processed file: {file_name}");
        Ok(())
    }

    /// Handle a single filesystem change notification.
    ///
    /// Identical logic to the bulk scan: digest-gate, then embed and upsert.
    /// Per-file failures are logged and swallowed so one bad file never
    /// stops the listener.
    pub async fn handle_event(&mut self, path: &Path) {
        if !path.is_file() {
            return;
        }
        if self.should_process(path).await {
            if let Err(e) = self.process(path).await {
                warn!("Error processing file {}: {e:#}", path.display());
            }
        }
    }

    /// Walk the vault root and index every file whose content changed since
    /// it was last seen. Excluded and hidden directories are pruned before
    /// descent, so excluded subtrees cost nothing. Returns the number of
    /// files (re)embedded.
    pub async fn scan_tree(&mut self) -> Result<usize> {
        let excluded = self.excluded_dirs.clone();
        let walker = WalkBuilder::new(&self.vault_root)
            .standard_filters(false)
            .hidden(true)
            .filter_entry(move |entry| {
                !excluded.contains(entry.file_name().to_string_lossy().as_ref())
            })
            .build();

        let mut processed = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error walking vault: {e}");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if self.should_process(path).await {
                match self.process(path).await {
                    Ok(()) => processed += 1,
                    Err(e) => warn!("Error processing file {}: {e:#}", path.display()),
                }
            }
        }

        debug!("Scan complete, {processed} files (re)embedded");
        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory_store::MemoryVectorStore;
    use tempfile::tempdir;
    use vault_ai_embed::MockEmbeddingProvider;

    fn manager(root: &Path) -> (IndexManager, Arc<MockEmbeddingProvider>, Arc<MemoryVectorStore>) {
        let embedder = Arc::new(MockEmbeddingProvider::new());
        let store = Arc::new(MemoryVectorStore::new());
        let manager = IndexManager::new(
            root.to_path_buf(),
            HashSet::from([".obsidian".to_string(), "tool-cache".to_string()]),
            embedder.clone(),
            store.clone(),
        );
        (manager, embedder, store)
    }

    #[tokio::test]
    async fn test_should_process_tracks_content_changes() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("note.md");
        tokio::fs::write(&path, "first version").await?;

        let (mut manager, _, _) = manager(dir.path());

        assert!(manager.should_process(&path).await, "unseen file");
        assert!(!manager.should_process(&path).await, "unchanged file");

        tokio::fs::write(&path, "second version").await?;
        assert!(manager.should_process(&path).await, "changed file");
        Ok(())
    }

    #[tokio::test]
    async fn test_should_process_rejects_hidden_and_excluded() -> Result<()> {
        let dir = tempdir()?;
        let excluded = dir.path().join("tool-cache").join("state.md");
        let hidden_dir = dir.path().join(".obsidian").join("workspace.json");
        let hidden_file = dir.path().join(".secret.md");
        for path in [&excluded, &hidden_dir, &hidden_file] {
            tokio::fs::create_dir_all(path.parent().unwrap()).await?;
            tokio::fs::write(path, "content").await?;
        }

        let (mut manager, embedder, _) = manager(dir.path());

        assert!(!manager.should_process(&excluded).await);
        assert!(!manager.should_process(&hidden_dir).await);
        assert!(!manager.should_process(&hidden_file).await);
        assert_eq!(embedder.call_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped_without_error() {
        let dir = tempdir().unwrap();
        let (mut manager, _, _) = manager(dir.path());
        assert!(!manager.should_process(&dir.path().join("missing.md")).await);
    }

    #[tokio::test]
    async fn test_process_builds_composite_document() -> Result<()> {
        let dir = tempdir()?;
        let sub = dir.path().join("projects");
        tokio::fs::create_dir(&sub).await?;
        let path = sub.join("plan.md");
        tokio::fs::write(&path, "ship the thing").await?;

        let (mut manager, _, store) = manager(dir.path());
        assert!(manager.should_process(&path).await);
        manager.process(&path).await?;

        let matches = store.query(&[0.0; 64], 10).await?;
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "plan.md");
        assert_eq!(matches[0].metadata.file_name, "plan.md");
        assert_eq!(
            matches[0].metadata.relative_path,
            Path::new("projects").join("plan.md").to_string_lossy()
        );
        assert!(matches[0].content.starts_with("File Name: plan.md\n"));
        assert!(matches[0].content.contains("ship the thing"));
        Ok(())
    }

    #[tokio::test]
    async fn test_rescan_is_idempotent() -> Result<()> {
        let dir = tempdir()?;
        tokio::fs::write(dir.path().join("a.md"), "alpha note").await?;
        tokio::fs::write(dir.path().join("b.md"), "beta note").await?;

        let (mut manager, embedder, store) = manager(dir.path());

        assert_eq!(manager.scan_tree().await?, 2);
        assert_eq!(store.len().await, 2);
        let calls_after_first = embedder.call_count();
        assert_eq!(calls_after_first, 2);

        // No content changed: zero additional embedding calls
        assert_eq!(manager.scan_tree().await?, 0);
        assert_eq!(embedder.call_count(), calls_after_first);
        Ok(())
    }

    #[tokio::test]
    async fn test_single_change_causes_single_reembed() -> Result<()> {
        let dir = tempdir()?;
        let a = dir.path().join("a.md");
        tokio::fs::write(&a, "alpha note").await?;
        tokio::fs::write(dir.path().join("b.md"), "beta note").await?;

        let (mut manager, embedder, _) = manager(dir.path());
        manager.scan_tree().await?;
        let baseline = embedder.call_count();

        tokio::fs::write(&a, "alpha note, revised").await?;
        assert_eq!(manager.scan_tree().await?, 1);
        assert_eq!(embedder.call_count(), baseline + 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_prunes_excluded_subtrees() -> Result<()> {
        let dir = tempdir()?;
        tokio::fs::write(dir.path().join("kept.md"), "kept").await?;
        let skipped = dir.path().join(".obsidian");
        tokio::fs::create_dir(&skipped).await?;
        tokio::fs::write(skipped.join("app.json"), "{}").await?;
        let tool = dir.path().join("tool-cache");
        tokio::fs::create_dir(&tool).await?;
        tokio::fs::write(tool.join("blob.md"), "skip me").await?;

        let (mut manager, _, store) = manager(dir.path());
        assert_eq!(manager.scan_tree().await?, 1);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_file_does_not_abort_scan() -> Result<()> {
        let dir = tempdir()?;
        tokio::fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00, 0x9f]).await?;
        tokio::fs::write(dir.path().join("good.md"), "fine").await?;

        let (mut manager, _, store) = manager(dir.path());
        assert_eq!(manager.scan_tree().await?, 1);
        assert_eq!(store.len().await, 1);

        // Not retried until content changes
        assert_eq!(manager.scan_tree().await?, 0);
        Ok(())
    }
}
