//! Configuration for embedding models

use serde::{Deserialize, Serialize};

/// Configuration for embedding models.
///
/// The defaults select the built-in fastembed all-MiniLM-L6-v2 model, a small
/// sentence-transformer that runs locally without external API calls. The
/// same config with the same input text always produces the same vectors,
/// which keeps re-indexing idempotent for unchanged content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedConfig {
    /// Name of the embedding model to use
    pub model_name: String,
    /// Maximum batch size for embedding generation
    pub batch_size: usize,
    /// Whether to normalize embeddings to unit length
    pub normalize: bool,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: "all-MiniLM-L6-v2".to_string(),
            batch_size: 16,
            normalize: true,
        }
    }
}

impl EmbedConfig {
    /// Create a configuration for the named model with default settings.
    pub fn new<S: Into<String>>(model_name: S) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the maximum batch size for embedding generation.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set whether embeddings are normalized to unit length.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbedConfig::default();
        assert_eq!(config.model_name, "all-MiniLM-L6-v2");
        assert_eq!(config.batch_size, 16);
        assert!(config.normalize);
    }

    #[test]
    fn test_builder_methods() {
        let config = EmbedConfig::new("custom-model")
            .with_batch_size(32)
            .with_normalize(false);
        assert_eq!(config.model_name, "custom-model");
        assert_eq!(config.batch_size, 32);
        assert!(!config.normalize);
    }
}
