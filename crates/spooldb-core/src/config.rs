//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StorageError};
use crate::types::DEFAULT_CHUNK_SIZE;

/// Configuration for an [`Engine`](crate::api::Engine).
///
/// # Example
///
/// ```rust
/// use spooldb_core::config::EngineConfig;
///
/// let config = EngineConfig::with_root_dir("/var/lib/spooldb");
/// assert_eq!(config.default_chunk_size, 1024);
/// assert!(config.scratch_dir.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding one subdirectory per database.
    pub root_dir: PathBuf,

    /// Directory for runs and partitions. When `None`, the engine creates a
    /// private temporary directory that lives as long as the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<PathBuf>,

    /// Batch size used by `Database::sort_merge` and query pipelines.
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("databases"),
            scratch_dir: None,
            default_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration rooted at `root_dir`.
    #[must_use]
    pub fn with_root_dir(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Creates a configuration for tests: tiny sort batches so that every
    /// sort goes through the merge path.
    #[must_use]
    pub fn for_testing(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            scratch_dir: None,
            default_chunk_size: 2,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.default_chunk_size == 0 {
            return Err(
                StorageError::InvalidConfig("default_chunk_size must be at least 1".into()).into(),
            );
        }
        if self.root_dir.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig("root_dir must not be empty".into()).into());
        }
        Ok(())
    }
}
