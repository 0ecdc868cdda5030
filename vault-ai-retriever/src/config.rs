//! Runtime configuration.
//!
//! All knobs are supplied at startup (TOML file plus CLI overrides); there
//! is no runtime reconfiguration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vault_ai_embed::EmbedConfig;

use crate::generate::GeneratorConfig;

/// Top-level configuration for the serve loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Root of the watched document tree
    pub vault_root: PathBuf,
    /// Directory where request/response files are exchanged
    pub plugin_dir: PathBuf,
    /// Directory names skipped entirely during scans and event handling
    pub excluded_dirs: Vec<String>,
    /// Gateway polling interval in seconds
    pub poll_interval_secs: u64,
    /// Debounce window for filesystem events, in seconds
    pub debounce_secs: u64,
    /// Character budget per document for snippet extraction
    pub snippet_max_chars: usize,
    /// Number of documents fetched per retrieval query
    pub top_k: usize,
    /// Embedding model settings
    pub embedding: EmbedConfig,
    /// Answer generation backend settings
    pub generator: GeneratorConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            vault_root: PathBuf::from("."),
            plugin_dir: PathBuf::from("."),
            excluded_dirs: vec![".obsidian".to_string()],
            poll_interval_secs: 1,
            debounce_secs: 2,
            snippet_max_chars: 3000,
            top_k: 10,
            embedding: EmbedConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from a TOML file, or defaults when `path` is None.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn excluded_dirs(&self) -> HashSet<String> {
        self.excluded_dirs.iter().cloned().collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}
