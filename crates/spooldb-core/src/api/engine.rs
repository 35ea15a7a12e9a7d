//! The engine: database lifecycle under one root directory.

use std::fs;
use std::io;

use tracing::debug;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::{Result, StorageError};
use crate::storage::ScratchDir;
use crate::types::{METADATA_FILE, validate_name};

use super::database::Database;

/// Entry point: owns the configuration and the scratch space shared by
/// every database opened through it.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    scratch: ScratchDir,
}

impl Engine {
    /// Validate `config`, create the root directory if needed and set up
    /// scratch space.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.root_dir)?;
        let scratch = match &config.scratch_dir {
            Some(dir) => ScratchDir::at(dir)?,
            None => ScratchDir::temporary()?,
        };
        debug!(
            root = %config.root_dir.display(),
            scratch = %scratch.path().display(),
            "engine ready"
        );
        Ok(Self { config, scratch })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Create a database directory with an empty catalog.
    pub fn create_database(&self, name: &str) -> Result<Database> {
        validate_name(name)?;
        let dir = self.config.root_dir.join(name);
        fs::create_dir(&dir).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => StorageError::DatabaseAlreadyExists(name.to_string()),
            _ => StorageError::Io(e),
        })?;
        Catalog::create(dir.join(METADATA_FILE))?;
        debug!(db = name, "created database");
        Ok(self.handle(name))
    }

    /// Remove a database directory and everything in it.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.config.root_dir.join(name);
        if !dir.is_dir() {
            return Err(StorageError::DatabaseNotFound(name.to_string()).into());
        }
        fs::remove_dir_all(&dir)?;
        debug!(db = name, "dropped database");
        Ok(())
    }

    /// Names of all databases under the root, sorted.
    ///
    /// Only directories holding a catalog file count as databases.
    pub fn list_databases(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.root_dir)? {
            let path = entry?.path();
            if !path.join(METADATA_FILE).is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Open a handle on an existing database.
    pub fn open(&self, name: &str) -> Result<Database> {
        validate_name(name)?;
        if !self.config.root_dir.join(name).join(METADATA_FILE).is_file() {
            return Err(StorageError::DatabaseNotFound(name.to_string()).into());
        }
        Ok(self.handle(name))
    }

    fn handle(&self, name: &str) -> Database {
        Database::new(
            name.to_string(),
            self.config.root_dir.join(name),
            self.scratch.clone(),
            self.config.default_chunk_size,
        )
    }
}
