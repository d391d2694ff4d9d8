//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `mode` — how an eviction happened: "lazy" (discovered by a read) or
//!   "sweep" (removed by `sweep_expired`)
//! - `operation` — store operation that failed: "get" or "set"

/// Total cache hits.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses. Expired entries discovered by a read count as
/// misses in addition to a lazy eviction.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total entries written (insert or full-replace upsert).
pub const CACHE_WRITES_TOTAL: &str = "muninn_cache_writes_total";

/// Total entries evicted because they expired.
///
/// Labels: `mode` ("lazy" | "sweep").
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";

/// Total store operations that failed and were absorbed by the
/// middleware's degraded path.
///
/// Labels: `operation` ("get" | "set").
pub const STORE_ERRORS_TOTAL: &str = "muninn_store_errors_total";
