//! File-based lock backend.
//!
//! One lock file per (lock type, resource key) under
//! `<lock_dir>/<lock_type>/<sanitized-key>.lock`. Exclusion comes from the
//! OS advisory lock (`flock` with `LOCK_EX | LOCK_NB`) held on the open
//! descriptor, not from file existence, and the OS drops the lock when the
//! holding process dies, so this backend auto-releases. Lock files are
//! never deleted: unlinking a path that another process may be about to
//! lock reintroduces the race the advisory lock exists to prevent.
//!
//! While a lock is held, the file carries JSON holder metadata for
//! operators (`lockyard list`); the metadata is truncated away on release.
//!
//! Recursion is not supported: a second `flock` on a fresh descriptor for
//! the same file conflicts even within one process.

use std::fs::{self, File, OpenOptions};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::acquire_with_polling;
use super::metadata::LockMetadata;
use crate::error::{LockError, LockResult};
use crate::factory::{validate_lock_type, validate_resource_key, LockFactory};
use crate::handle::{HandleState, Lock};

/// Longest sanitized file stem before truncation with a hash suffix kicks in.
const MAX_STEM_LEN: usize = 120;

/// Lock factory backed by OS advisory file locks.
#[derive(Debug)]
pub struct FileLockFactory {
    lock_type: String,
    dir: PathBuf,
    available: bool,
}

impl FileLockFactory {
    /// Create a factory storing locks under `<root>/<lock_type>/`.
    ///
    /// Availability is probed once here: the directory must be creatable
    /// and writable. An unavailable factory is still returned (callers
    /// check [`is_available`](LockFactory::is_available)); only an invalid
    /// lock type is an immediate error.
    pub fn new(root: &Path, lock_type: &str) -> LockResult<Self> {
        validate_lock_type(lock_type)?;
        let dir = root.join(lock_type);
        let available = probe_writable(&dir);
        if !available {
            tracing::debug!(
                lock_type,
                dir = %dir.display(),
                "lock directory not writable; file backend unavailable"
            );
        }
        Ok(Self {
            lock_type: lock_type.to_string(),
            dir,
            available,
        })
    }

    /// The directory this factory stores lock files in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock_path(&self, resource: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", safe_filename(resource)))
    }

    /// One acquisition attempt: open (never truncate) and try the OS lock.
    #[cfg(unix)]
    fn try_acquire(&self, resource: &str) -> LockResult<Option<Lock>> {
        use std::os::fd::AsRawFd;

        let path = self.lock_path(resource);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::Io(format!(
                    "failed to open lock file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::EWOULDBLOCK) | Some(libc::EINTR) => {
                    tracing::debug!(
                        lock_type = %self.lock_type,
                        resource,
                        "file lock held elsewhere"
                    );
                    Ok(None)
                }
                _ => Err(LockError::Io(format!(
                    "flock failed on '{}': {}",
                    path.display(),
                    err
                ))),
            };
        }

        // We hold the lock; replace whatever stale metadata was left behind.
        let metadata = LockMetadata::new(resource);
        if let Err(e) = write_metadata(&mut file, &metadata) {
            tracing::warn!(
                lock_type = %self.lock_type,
                resource,
                error = %e,
                "acquired file lock but failed to write holder metadata"
            );
        }

        tracing::debug!(lock_type = %self.lock_type, resource, "acquired file lock");
        Ok(Some(Lock::new(
            &self.lock_type,
            resource,
            HandleState::File { file },
        )))
    }

    #[cfg(not(unix))]
    fn try_acquire(&self, _resource: &str) -> LockResult<Option<Lock>> {
        Err(LockError::Unavailable(
            "file locking is not supported on this platform".to_string(),
        ))
    }
}

impl LockFactory for FileLockFactory {
    fn lock_type(&self) -> &str {
        &self.lock_type
    }

    fn is_available(&self) -> bool {
        cfg!(unix) && self.available
    }

    fn supports_timeout(&self) -> bool {
        true
    }

    fn supports_recursion(&self) -> bool {
        false
    }

    fn supports_auto_release(&self) -> bool {
        // The OS drops the flock when the holding process exits.
        true
    }

    fn get_lock_with_expiry(
        &self,
        resource: &str,
        timeout: Duration,
        _expiry: Duration,
    ) -> LockResult<Option<Lock>> {
        validate_resource_key(resource)?;
        if !self.is_available() {
            return Err(LockError::Unavailable(format!(
                "lock directory '{}' is not writable",
                self.dir.display()
            )));
        }
        // Expiry is ignored: auto-release makes leases unnecessary here.
        acquire_with_polling(timeout, || self.try_acquire(resource))
    }
}

/// Release a held file lock: clear the metadata, then close the descriptor.
///
/// Closing releases the OS lock; the truncation only tidies the metadata
/// and is best-effort since we still hold the lock while doing it.
pub(crate) fn release_file(file: File) -> bool {
    if let Err(e) = file.set_len(0) {
        tracing::warn!(error = %e, "failed to truncate lock file metadata on release");
    }
    drop(file);
    true
}

fn write_metadata(file: &mut File, metadata: &LockMetadata) -> LockResult<()> {
    let json = metadata.to_json()?;
    let io = |e: std::io::Error| LockError::Io(format!("failed to write lock metadata: {}", e));
    file.set_len(0).map_err(io)?;
    file.write_all(json.as_bytes()).map_err(io)?;
    file.sync_all().map_err(io)?;
    Ok(())
}

/// Whether `dir` can be created and written to.
fn probe_writable(dir: &Path) -> bool {
    if fs::create_dir_all(dir).is_err() {
        return false;
    }
    let probe = dir.join(format!(".probe-{}", std::process::id()));
    match File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Convert a resource key to a safe lock file stem.
///
/// Alphanumerics, `-`, `_` and `.` pass through; anything else is
/// percent-escaped so distinct keys never collide. Overlong results are
/// truncated with a hash suffix to stay within filesystem name limits.
pub(crate) fn safe_filename(resource: &str) -> String {
    let mut stem = String::with_capacity(resource.len());
    for c in resource.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            stem.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                stem.push_str(&format!("%{:02x}", byte));
            }
        }
    }

    if stem.len() > MAX_STEM_LEN {
        let mut hasher = DefaultHasher::new();
        resource.hash(&mut hasher);
        let digest = hasher.finish();
        stem.truncate(MAX_STEM_LEN - 17);
        stem.push('-');
        stem.push_str(&format!("{:016x}", digest));
    }
    stem
}

/// A file lock currently held by some process, as seen by `lockyard list`.
#[derive(Debug, Clone)]
pub struct HeldLock {
    /// The lock file path.
    pub path: PathBuf,

    /// The lock type (directory name).
    pub lock_type: String,

    /// Sanitized lock file stem (the resource key is inside the metadata).
    pub name: String,

    /// The holder metadata read from the file.
    pub metadata: LockMetadata,

    /// Whether the lock has been held past the staleness threshold.
    pub is_stale: bool,
}

impl std::fmt::Display for HeldLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} (owner: {}, age: {}{})",
            self.lock_type,
            self.metadata.resource,
            self.metadata.owner,
            self.metadata.age_string(),
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}

/// List locks that currently carry holder metadata under `root`.
///
/// Lock files persist after release with their metadata truncated, so only
/// non-empty files are reported. Unreadable or malformed files are skipped;
/// a lock being released while we scan looks exactly like that.
pub fn list_held(root: &Path, stale_minutes: u32) -> LockResult<Vec<HeldLock>> {
    let mut held = Vec::new();
    if !root.exists() {
        return Ok(held);
    }

    let type_dirs = fs::read_dir(root).map_err(|e| {
        LockError::Io(format!(
            "failed to read lock directory '{}': {}",
            root.display(),
            e
        ))
    })?;

    for type_dir in type_dirs {
        let type_dir = type_dir
            .map_err(|e| LockError::Io(format!("failed to read lock directory entry: {}", e)))?;
        if !type_dir.path().is_dir() {
            continue;
        }
        let lock_type = type_dir.file_name().to_string_lossy().to_string();

        let entries = fs::read_dir(type_dir.path()).map_err(|e| {
            LockError::Io(format!(
                "failed to read lock type directory '{}': {}",
                type_dir.path().display(),
                e
            ))
        })?;

        for entry in entries {
            let entry = entry
                .map_err(|e| LockError::Io(format!("failed to read lock file entry: {}", e)))?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            match entry.metadata() {
                Ok(m) if m.len() > 0 => {}
                _ => continue,
            }

            let metadata = match LockMetadata::from_file(&path) {
                Ok(meta) => meta,
                Err(_) => continue,
            };

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string();
            let is_stale = metadata.is_stale(stale_minutes);

            held.push(HeldLock {
                path,
                lock_type: lock_type.clone(),
                name,
                metadata,
                is_stale,
            });
        }
    }

    held.sort_by(|a, b| (&a.lock_type, &a.name).cmp(&(&b.lock_type, &b.name)));
    Ok(held)
}

/// Force-clear a lock file's holder metadata.
///
/// Operator recovery for orphaned metadata (e.g. a holder that died while
/// the OS still shows the file as held elsewhere). Returns the metadata
/// that was cleared for auditing. The file itself is kept, consistent with
/// the never-delete rule.
pub fn force_clear(root: &Path, lock_type: &str, resource: &str) -> LockResult<LockMetadata> {
    validate_lock_type(lock_type)?;
    validate_resource_key(resource)?;

    let path = root
        .join(lock_type)
        .join(format!("{}.lock", safe_filename(resource)));
    let held = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    if !held {
        return Err(LockError::NotHeld(format!(
            "lock '{}/{}' is not held (no metadata at {})",
            lock_type,
            resource,
            path.display()
        )));
    }

    let metadata = LockMetadata::from_file(&path)?;
    fs::write(&path, b"").map_err(|e| {
        LockError::Io(format!(
            "failed to clear lock file '{}': {}",
            path.display(),
            e
        ))
    })?;
    Ok(metadata)
}
