//! Fingerprinted, TTL-scoped response store.
//!
//! [`CacheStore`] owns a single SQLite table mapping a [`Fingerprint`]
//! (derived from model, prompt, and canonicalized context) to a cached
//! response with usage accounting. It knows nothing about what a
//! "generation call" is; the interception layer lives in
//! [`middleware`](crate::middleware).
//!
//! # Expiration
//!
//! Two mechanisms coexist:
//!
//! - **Lazy eviction** — a read that discovers an expired entry treats it
//!   as a miss and deletes the row.
//! - **Sweep** — [`CacheStore::sweep_expired`] removes every expired row
//!   in one pass. [`Sweeper`] runs it on an interval; store correctness
//!   never depends on the sweeper running.
//!
//! # Concurrency
//!
//! One connection behind a mutex, every operation under
//! `tokio::task::spawn_blocking` so SQLite I/O never blocks the async
//! runtime. The mutex makes each logical operation (lookup + increment,
//! or upsert) atomic with respect to the same fingerprint; the hit
//! counter additionally increments via `usage_count = usage_count + 1`
//! inside SQL, so concurrent hits cannot lose updates. No lock is held
//! across a generation call.

pub mod fingerprint;
pub mod sweeper;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{MuninnError, Result, telemetry};

pub use fingerprint::Fingerprint;
pub use sweeper::Sweeper;

use fingerprint::canonical_json;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS response_cache (
    fingerprint TEXT PRIMARY KEY,
    model TEXT NOT NULL,
    prompt TEXT NOT NULL,
    response TEXT NOT NULL,
    context TEXT,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    usage_count INTEGER NOT NULL DEFAULT 1
)";

/// Configuration for [`CacheStore`].
///
/// ```rust
/// # use muninn::StoreConfig;
/// let config = StoreConfig::new().path("/var/lib/muninn/cache.db");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the SQLite database file. Parent directories are created
    /// on open. Default: `~/.muninn/cache.db`.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".muninn")
            .join("cache.db");
        Self { path }
    }
}

impl StoreConfig {
    /// Create a config with the default database location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database file path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

/// A persisted cache row, as returned by [`CacheStore::entry`].
///
/// `prompt` and `context` are stored verbatim so operators can inspect
/// what produced a cached response; neither is consulted on the read
/// path (the fingerprint already encodes both).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Primary key, derived from (model, prompt, context).
    pub fingerprint: Fingerprint,
    /// Operand identity the response was generated by.
    pub model: String,
    /// Raw request text.
    pub prompt: String,
    /// The cached result.
    pub response: String,
    /// Canonical (key-sorted) JSON snapshot of the request context, or
    /// `None` if the request carried no context.
    pub context: Option<String>,
    /// Unix seconds at insertion.
    pub created_at: i64,
    /// Absolute expiry in unix seconds; `None` never expires.
    pub expires_at: Option<i64>,
    /// 1 at creation, +1 per hit read.
    pub usage_count: u64,
}

/// Aggregate store statistics.
///
/// `total_hits` sums `usage_count` over all live rows, so a never-read
/// entry still contributes its initial 1: hit rates derived from this
/// number include the originating write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of rows currently in the table, expired or not.
    pub total_entries: u64,
    /// Sum of all `usage_count` values.
    pub total_hits: u64,
    /// `total_hits / total_entries`; 0.0 for an empty store.
    pub avg_hits_per_entry: f64,
    /// Rows already past their `expires_at` but not yet removed.
    pub expired_entries: u64,
    /// Sum of response lengths in bytes (not characters).
    pub total_size_bytes: u64,
}

/// Outcome of a fingerprint lookup, resolved inside the blocking section.
enum Lookup {
    Hit(String),
    Miss,
    Expired,
    Malformed,
}

/// Durable response store keyed by [`Fingerprint`].
///
/// Cheap to share: wrap in an [`Arc`] and hand clones to every caller.
/// All methods take `&self`.
pub struct CacheStore {
    conn: Arc<Mutex<Connection>>,
}

impl CacheStore {
    /// Open (or create) the store at the configured path.
    ///
    /// Creates parent directories and the table if missing.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MuninnError::Configuration(format!(
                    "cannot create cache directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(&config.path)?;
        Self::init(conn)
    }

    /// Open an in-memory store. Contents are lost on drop.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Look up a cached response.
    ///
    /// Returns `Ok(None)` for a missing key; absence is a normal outcome,
    /// never an error. An expired entry is treated as absent and removed
    /// as a side effect. On a hit the entry's `usage_count` is
    /// incremented atomically with the lookup.
    pub async fn get(
        &self,
        model: &str,
        prompt: &str,
        context: Option<&Value>,
    ) -> Result<Option<String>> {
        let fingerprint = Fingerprint::derive(model, prompt, context)?;
        let key = fingerprint.as_str().to_owned();

        let outcome = self
            .with_conn(move |conn| {
                let now = now_epoch();
                let row = conn
                    .query_row(
                        "SELECT response, expires_at FROM response_cache WHERE fingerprint = ?1",
                        params![key],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)),
                    )
                    .optional();

                match row {
                    Ok(None) => Ok(Lookup::Miss),
                    Ok(Some((_, Some(expires_at)))) if expires_at <= now => {
                        conn.execute(
                            "DELETE FROM response_cache WHERE fingerprint = ?1",
                            params![key],
                        )?;
                        Ok(Lookup::Expired)
                    }
                    Ok(Some((response, _))) => {
                        conn.execute(
                            "UPDATE response_cache SET usage_count = usage_count + 1 \
                             WHERE fingerprint = ?1",
                            params![key],
                        )?;
                        Ok(Lookup::Hit(response))
                    }
                    Err(e) if is_malformed(&e) => {
                        warn!(fingerprint = %key, "malformed cache row, treating as absent: {e}");
                        conn.execute(
                            "DELETE FROM response_cache WHERE fingerprint = ?1",
                            params![key],
                        )?;
                        Ok(Lookup::Malformed)
                    }
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        match outcome {
            Lookup::Hit(response) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Ok(Some(response))
            }
            Lookup::Expired => {
                debug!(fingerprint = %fingerprint, "expired cache entry removed on read");
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "mode" => "lazy").increment(1);
                Ok(None)
            }
            Lookup::Miss | Lookup::Malformed => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                Ok(None)
            }
        }
    }

    /// Insert or fully replace the entry for (model, prompt, context).
    ///
    /// An upsert replaces every column: `usage_count` restarts at 1 and
    /// `created_at` is fresh. `Duration::ZERO` sets `expires_at` to now,
    /// i.e. the entry is already expired (test hook for forcing expiry).
    /// Empty responses are stored as passed; declining to cache them is
    /// the caller's policy, enforced by the middleware layer.
    pub async fn set(
        &self,
        model: &str,
        prompt: &str,
        response: &str,
        context: Option<&Value>,
        ttl: Duration,
    ) -> Result<()> {
        let fingerprint = Fingerprint::derive(model, prompt, context)?;
        let context_json = match context {
            Some(value) => Some(canonical_json(value)?),
            None => None,
        };

        let key = fingerprint.as_str().to_owned();
        let model = model.to_owned();
        let prompt = prompt.to_owned();
        let response = response.to_owned();

        self.with_conn(move |conn| {
            let now = now_epoch();
            let expires_at = now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX));
            conn.execute(
                "INSERT OR REPLACE INTO response_cache \
                 (fingerprint, model, prompt, response, context, created_at, expires_at, usage_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)",
                params![key, model, prompt, response, context_json, now, expires_at],
            )?;
            Ok(())
        })
        .await?;

        metrics::counter!(telemetry::CACHE_WRITES_TOTAL).increment(1);
        Ok(())
    }

    /// Remove the entry for a fingerprint. Removing an absent key is a
    /// no-op, not an error.
    pub async fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        let key = fingerprint.as_str().to_owned();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM response_cache WHERE fingerprint = ?1",
                params![key],
            )?;
            Ok(())
        })
        .await
    }

    /// Remove every entry past its expiry; returns the number removed.
    ///
    /// Independent of lazy eviction: safe to run on a schedule (see
    /// [`Sweeper`]) without affecting `get`'s correctness.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let removed = self
            .with_conn(|conn| {
                let now = now_epoch();
                let n = conn.execute(
                    "DELETE FROM response_cache \
                     WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    params![now],
                )?;
                Ok(n as u64)
            })
            .await?;

        if removed > 0 {
            debug!(removed, "swept expired cache entries");
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "mode" => "sweep")
                .increment(removed);
        }
        Ok(removed)
    }

    /// Aggregate statistics over the whole table.
    pub async fn stats(&self) -> Result<CacheStats> {
        self.with_conn(|conn| {
            let now = now_epoch();
            conn.query_row(
                "SELECT COUNT(*), \
                        COALESCE(SUM(usage_count), 0), \
                        COALESCE(AVG(usage_count), 0.0), \
                        COALESCE(SUM(CASE WHEN expires_at IS NOT NULL AND expires_at <= ?1 \
                                          THEN 1 ELSE 0 END), 0), \
                        COALESCE(SUM(LENGTH(CAST(response AS BLOB))), 0) \
                 FROM response_cache",
                params![now],
                |row| {
                    Ok(CacheStats {
                        total_entries: row.get::<_, i64>(0)? as u64,
                        total_hits: row.get::<_, i64>(1)? as u64,
                        avg_hits_per_entry: row.get(2)?,
                        expired_entries: row.get::<_, i64>(3)? as u64,
                        total_size_bytes: row.get::<_, i64>(4)? as u64,
                    })
                },
            )
            .map_err(Into::into)
        })
        .await
    }

    /// Fetch the raw persisted row for a fingerprint, for inspection and
    /// debugging. Unlike [`get`](Self::get), this returns expired rows
    /// as-is and does not touch `usage_count`.
    pub async fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        let key = fingerprint.as_str().to_owned();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT fingerprint, model, prompt, response, context, \
                        created_at, expires_at, usage_count \
                 FROM response_cache WHERE fingerprint = ?1",
                params![key],
                |row| {
                    Ok(CacheEntry {
                        fingerprint: Fingerprint::from_stored(row.get(0)?),
                        model: row.get(1)?,
                        prompt: row.get(2)?,
                        response: row.get(3)?,
                        context: row.get(4)?,
                        created_at: row.get(5)?,
                        expires_at: row.get(6)?,
                        usage_count: row.get::<_, i64>(7)? as u64,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    /// Number of rows currently in the table, expired or not.
    pub async fn len(&self) -> Result<u64> {
        self.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM response_cache", [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
            .map_err(Into::into)
        })
        .await
    }

    /// Whether the table holds no rows at all.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove all entries.
    pub async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM response_cache", [])?;
            Ok(())
        })
        .await
    }

    /// Run `op` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| MuninnError::Storage(format!("connection lock poisoned: {e}")))?;
            op(&conn)
        })
        .await
        .map_err(|e| MuninnError::Storage(format!("blocking task failed: {e}")))?
    }
}

/// Rows whose columns fail type conversion were written by something
/// other than a correct writer; reads treat them as absent.
fn is_malformed(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
    )
}

/// Current unix time in seconds, the clock for all expiry computation.
fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
