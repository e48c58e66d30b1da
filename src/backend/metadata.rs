//! Holder metadata written into file-backend lock files.
//!
//! The OS advisory lock is what provides exclusion; the metadata exists
//! for operators. `lockyard list` reads it to report who holds a lock and
//! for how long, and contention errors quote it when available.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{LockError, LockResult};

/// Metadata describing the holder of a lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMetadata {
    /// Holder of the lock (e.g. `user@HOST`).
    pub owner: String,

    /// Process ID of the holder (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Timestamp when the lock was acquired (RFC3339).
    pub acquired_at: DateTime<Utc>,

    /// The resource key the lock protects.
    pub resource: String,
}

impl LockMetadata {
    /// Create new metadata for the current process with the current time.
    pub fn new(resource: &str) -> Self {
        Self {
            owner: owner_string(),
            pid: Some(std::process::id()),
            acquired_at: Utc::now(),
            resource: resource.to_string(),
        }
    }

    /// Parse metadata from a lock file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> LockResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            LockError::Io(format!(
                "failed to read lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            LockError::Io(format!(
                "failed to parse lock file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Serialize metadata to a JSON string.
    pub fn to_json(&self) -> LockResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LockError::Io(format!("failed to serialize lock metadata: {}", e)))
    }

    /// How long the lock has been held.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let minutes = age.num_minutes();
        let hours = age.num_hours();
        let days = age.num_days();

        if days > 0 {
            format!("{}d {}h", days, hours % 24)
        } else if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else {
            format!("{}m", minutes)
        }
    }

    /// Whether the lock has been held longer than the given threshold.
    pub fn is_stale(&self, stale_minutes: u32) -> bool {
        self.age().num_minutes() > stale_minutes as i64
    }
}

/// Owner string identifying this process's user and host.
pub(crate) fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
