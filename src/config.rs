//! Configuration model for lockyard.
//!
//! Deployment configuration selects which backend strategy issues locks
//! and where that backend keeps its shared state. The struct is explicit
//! and passed to [`lock_factory`]; there is no ambient global selection.
//! Callers resolve it once at process start (from `lockyard.yaml` or
//! however their host application loads config) and hold on to it.
//!
//! YAML parsing is forward-compatible: unknown fields are ignored and
//! every field has a sensible default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::db::DbLockFactory;
use crate::backend::file::FileLockFactory;
use crate::backend::memory::MemoryLockFactory;
use crate::error::{LockError, LockResult};
use crate::factory::LockFactory;

/// Which backend strategy issues locks.
///
/// A closed set: backends are selected here at construction time, never by
/// runtime name-to-type resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OS advisory file locks in a shared directory (default).
    #[default]
    File,
    /// Rows in a shared SQLite lock table.
    Db,
    /// Process-local grant-everything registry; tests and dev only.
    Memory,
}

impl BackendKind {
    /// Parse a backend kind from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "db" => Some(Self::Db),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }

    /// The configuration spelling of this backend kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Db => "db",
            Self::Memory => "memory",
        }
    }
}

/// Configuration for lock factories.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Backend strategy backing every lock type.
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory for the file backend (one subdirectory per lock type).
    #[serde(default = "default_lock_dir")]
    pub lock_dir: PathBuf,

    /// SQLite database file for the db backend.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Minutes after which `lockyard list` marks a held lock as stale.
    #[serde(default = "default_stale_minutes")]
    pub stale_minutes: u32,
}

// Default value functions for serde
fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join("lockyard").join("locks")
}
fn default_db_path() -> PathBuf {
    std::env::temp_dir().join("lockyard").join("locks.db")
}
fn default_stale_minutes() -> u32 {
    120
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            lock_dir: default_lock_dir(),
            db_path: default_db_path(),
            stale_minutes: default_stale_minutes(),
        }
    }
}

impl LockConfig {
    /// Load config from a YAML file.
    ///
    /// # Errors
    ///
    /// * `LockError::Config` on read failure, parse failure, or invalid
    ///   values.
    pub fn load<P: AsRef<Path>>(path: P) -> LockResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LockError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: LockConfig = serde_yaml::from_str(&content).map_err(|e| {
            LockError::Config(format!(
                "failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate config values.
    pub fn validate(&self) -> LockResult<()> {
        if self.lock_dir.as_os_str().is_empty() {
            return Err(LockError::Config("lock_dir must not be empty".to_string()));
        }
        if self.db_path.as_os_str().is_empty() {
            return Err(LockError::Config("db_path must not be empty".to_string()));
        }
        if self.stale_minutes == 0 {
            return Err(LockError::Config(
                "stale_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Construct the configured lock factory for a lock type.
///
/// This is the registry callers go through: one call per lock type they
/// use, typically at startup, holding the returned factory for the life of
/// the process.
///
/// # Errors
///
/// * `LockError::InvalidKey` for an unusable lock type string.
/// * `LockError::Db` if the db backend's database cannot be opened.
pub fn lock_factory(config: &LockConfig, lock_type: &str) -> LockResult<Box<dyn LockFactory>> {
    crate::factory::validate_lock_type(lock_type)?;
    match config.backend {
        BackendKind::File => Ok(Box::new(FileLockFactory::new(&config.lock_dir, lock_type)?)),
        BackendKind::Db => Ok(Box::new(DbLockFactory::open(&config.db_path, lock_type)?)),
        BackendKind::Memory => Ok(Box::new(MemoryLockFactory::new(lock_type))),
    }
}
