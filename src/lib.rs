//! Muninn - response memoization for LLM generation calls
//!
//! This crate provides a fingerprinted, TTL-scoped cache in front of
//! expensive, non-deterministic generation calls. Identical requests
//! (same model, prompt, and conversational context) within the validity
//! window are served from a durable SQLite store instead of hitting the
//! provider again; expiration bounds storage growth and usage counters
//! let operators reason about hit rates and cost.
//!
//! Two components compose top-down: [`CacheStore`] owns the persisted
//! fingerprint-to-entry mapping, and [`Cached`] wraps any [`Generator`]
//! with transparent cache-check/cache-populate behavior. The store never
//! calls the middleware.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use muninn::{Cached, CacheStore, Generator, StoreConfig};
//!
//! struct Claude;
//!
//! #[async_trait]
//! impl Generator for Claude {
//!     fn identity(&self) -> &str {
//!         "claude-sonnet-4"
//!     }
//!
//!     async fn generate(
//!         &self,
//!         prompt: &str,
//!         _context: Option<&serde_json::Value>,
//!     ) -> muninn::Result<String> {
//!         // Provider HTTP call lives here.
//!         Ok(format!("response to: {prompt}"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let store = Arc::new(CacheStore::open(&StoreConfig::default())?);
//!
//!     let model = Cached::new(Claude, Arc::clone(&store)).ttl(Duration::from_secs(48 * 3600));
//!
//!     let first = model.generate("write a haiku about ravens", None).await?;
//!     let second = model.generate("write a haiku about ravens", None).await?;
//!     assert_eq!(first, second); // second call never reached the provider
//!
//!     println!("{:?}", store.stats().await?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod middleware;
pub mod store;
pub mod telemetry;

// Re-export main types at crate root
pub use error::{MuninnError, Result};
pub use middleware::{Cached, DEFAULT_TTL, Generator};
pub use store::{CacheEntry, CacheStats, CacheStore, Fingerprint, StoreConfig, Sweeper};
