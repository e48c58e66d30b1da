//! Database-row lock backend.
//!
//! Each lock is a row in a SQLite table keyed by (lock type, resource key)
//! with a holder token and an optional expiry timestamp. Acquisition is a
//! single conditional upsert, so the database's own atomicity is the
//! mutual-exclusion primitive; this module never reasons about races in
//! application code.
//!
//! Expiry is checked lazily: an acquisition attempt may steal a row whose
//! lease has passed, and nothing else ever looks at expiry (there is no
//! background sweep). That means this backend does not auto-release; a
//! holder that dies without an expiry lease keeps the row until an
//! operator clears it.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};

use super::acquire_with_polling;
use super::metadata::owner_string;
use crate::error::{LockError, LockResult};
use crate::factory::{validate_lock_type, validate_resource_key, LockFactory};
use crate::handle::{HandleState, Lock};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS lockyard_locks (
    locktype    TEXT NOT NULL,
    resourcekey TEXT NOT NULL,
    owner       TEXT NOT NULL,
    expires_at  INTEGER,
    PRIMARY KEY (locktype, resourcekey)
)";

/// Insert the row, or steal it only when its lease has passed.
///
/// The WHERE clause on the conflict arm makes the steal conditional inside
/// one atomic statement; zero rows changed means someone holds the lock.
const ACQUIRE_SQL: &str = "INSERT INTO lockyard_locks (locktype, resourcekey, owner, expires_at)
    VALUES (?1, ?2, ?3, ?4)
    ON CONFLICT (locktype, resourcekey) DO UPDATE
    SET owner = excluded.owner, expires_at = excluded.expires_at
    WHERE lockyard_locks.expires_at IS NOT NULL AND lockyard_locks.expires_at <= ?5";

const RELEASE_SQL: &str =
    "DELETE FROM lockyard_locks WHERE locktype = ?1 AND resourcekey = ?2 AND owner = ?3";

/// Lock factory backed by rows in a SQLite lock table.
#[derive(Debug)]
pub struct DbLockFactory {
    lock_type: String,
    conn: Arc<Mutex<Connection>>,
    owner_base: String,
    /// Distinguishes owner tokens across handles from this factory.
    handle_seq: AtomicU64,
}

impl DbLockFactory {
    /// Open (or create) the lock database and ensure the lock table.
    ///
    /// # Errors
    ///
    /// A database that cannot be opened or migrated is an infrastructure
    /// failure and errors here rather than producing a silently unusable
    /// factory.
    pub fn open(db_path: &Path, lock_type: &str) -> LockResult<Self> {
        validate_lock_type(lock_type)?;

        let conn = Connection::open(db_path)?;
        // WAL keeps concurrent lock holders in other processes from
        // starving writers; busy_timeout covers SQLite-level contention on
        // the database file itself, which is distinct from lock contention.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(SCHEMA, [])?;

        Ok(Self {
            lock_type: lock_type.to_string(),
            conn: Arc::new(Mutex::new(conn)),
            owner_base: format!("{}:{}", owner_string(), std::process::id()),
            handle_seq: AtomicU64::new(0),
        })
    }

    fn conn(&self) -> LockResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LockError::Io("lock database connection poisoned".to_string()))
    }

    fn next_owner_token(&self) -> String {
        let seq = self.handle_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}:{}", self.owner_base, seq)
    }

    /// One acquisition attempt with a fresh owner token.
    fn try_acquire(&self, resource: &str, expiry: Duration) -> LockResult<Option<Lock>> {
        let owner = self.next_owner_token();
        let now = Utc::now().timestamp();
        let expires_at: Option<i64> = if expiry.is_zero() {
            None
        } else {
            Some(now + expiry.as_secs() as i64)
        };

        let changed = self.conn()?.execute(
            ACQUIRE_SQL,
            params![self.lock_type, resource, owner, expires_at, now],
        )?;

        if changed == 1 {
            tracing::debug!(
                lock_type = %self.lock_type,
                resource,
                %owner,
                "acquired db lock"
            );
            Ok(Some(Lock::new(
                &self.lock_type,
                resource,
                HandleState::Db {
                    conn: Arc::clone(&self.conn),
                    owner,
                },
            )))
        } else {
            tracing::debug!(lock_type = %self.lock_type, resource, "db lock row held elsewhere");
            Ok(None)
        }
    }
}

impl LockFactory for DbLockFactory {
    fn lock_type(&self) -> &str {
        &self.lock_type
    }

    fn is_available(&self) -> bool {
        self.conn()
            .ok()
            .map(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .is_ok()
            })
            .unwrap_or(false)
    }

    fn supports_timeout(&self) -> bool {
        true
    }

    fn supports_recursion(&self) -> bool {
        false
    }

    fn supports_auto_release(&self) -> bool {
        // Expiry leases are honored lazily instead; see the module docs.
        false
    }

    fn get_lock_with_expiry(
        &self,
        resource: &str,
        timeout: Duration,
        expiry: Duration,
    ) -> LockResult<Option<Lock>> {
        validate_resource_key(resource)?;
        if !self.is_available() {
            return Err(LockError::Unavailable(
                "lock database is not answering".to_string(),
            ));
        }
        acquire_with_polling(timeout, || self.try_acquire(resource, expiry))
    }
}

/// Release a held row by deleting it under its owner token.
///
/// Zero rows deleted is still a successful release from the handle's point
/// of view: it means the lease expired and another caller lawfully stole
/// the row, so this handle no longer holds anything. Only a database
/// failure reports false.
pub(crate) fn release_row(
    conn: &Arc<Mutex<Connection>>,
    lock_type: &str,
    resource: &str,
    owner: &str,
) -> bool {
    let guard = match conn.lock() {
        Ok(guard) => guard,
        Err(_) => {
            tracing::error!(lock_type, resource, "lock database connection poisoned");
            return false;
        }
    };
    match guard.execute(RELEASE_SQL, params![lock_type, resource, owner]) {
        Ok(0) => {
            tracing::debug!(lock_type, resource, "db lock row already stolen after expiry");
            true
        }
        Ok(_) => true,
        Err(e) => {
            tracing::error!(lock_type, resource, error = %e, "failed to release db lock");
            false
        }
    }
}

/// A row currently present in the lock table, as seen by `lockyard list`.
#[derive(Debug, Clone)]
pub struct HeldRow {
    /// The lock type (namespace) column.
    pub lock_type: String,
    /// The resource key column.
    pub resource: String,
    /// The holder's owner token.
    pub owner: String,
    /// Unix timestamp the lease expires at, if one was set.
    pub expires_at: Option<i64>,
}

impl std::fmt::Display for HeldRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lease = match self.expires_at {
            Some(ts) => {
                if ts <= Utc::now().timestamp() {
                    " [EXPIRED]".to_string()
                } else {
                    format!(" (lease until {})", ts)
                }
            }
            None => String::new(),
        };
        write!(
            f,
            "{}/{} (owner: {}{})",
            self.lock_type, self.resource, self.owner, lease
        )
    }
}

/// List every row in the lock table, expired leases included.
pub fn list_rows(db_path: &Path) -> LockResult<Vec<HeldRow>> {
    let conn = Connection::open(db_path)?;
    conn.execute(SCHEMA, [])?;

    let mut stmt = conn.prepare(
        "SELECT locktype, resourcekey, owner, expires_at FROM lockyard_locks
         ORDER BY locktype, resourcekey",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(HeldRow {
            lock_type: row.get(0)?,
            resource: row.get(1)?,
            owner: row.get(2)?,
            expires_at: row.get(3)?,
        })
    })?;

    let mut held = Vec::new();
    for row in rows {
        held.push(row?);
    }
    Ok(held)
}

/// Force-delete a lock row regardless of its owner.
///
/// Operator recovery for rows left by holders that died without an expiry
/// lease. Returns the owner token that was evicted.
pub fn force_clear(db_path: &Path, lock_type: &str, resource: &str) -> LockResult<String> {
    validate_lock_type(lock_type)?;
    validate_resource_key(resource)?;

    let conn = Connection::open(db_path)?;
    conn.execute(SCHEMA, [])?;
    let owner: Option<String> = conn
        .query_row(
            "SELECT owner FROM lockyard_locks WHERE locktype = ?1 AND resourcekey = ?2",
            params![lock_type, resource],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    let Some(owner) = owner else {
        return Err(LockError::NotHeld(format!(
            "lock '{}/{}' has no row in the lock table",
            lock_type, resource
        )));
    };

    conn.execute(
        "DELETE FROM lockyard_locks WHERE locktype = ?1 AND resourcekey = ?2",
        params![lock_type, resource],
    )?;
    Ok(owner)
}
