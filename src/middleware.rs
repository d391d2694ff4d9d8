//! Call-interception middleware.
//!
//! [`Cached`] wraps any [`Generator`] with transparent cache-check /
//! cache-populate behavior: a hit returns the stored response without
//! invoking the wrapped operation at all; a miss invokes it, stores a
//! non-empty result under the wrapper's TTL, and returns it either way.
//!
//! Distinct wrappers carry distinct TTLs, so long-form content
//! generation can cache for 48 hours while short-answer generation
//! keeps the 24-hour default, against the same store.
//!
//! # Degraded mode
//!
//! Cache availability never blocks generation. A failed store lookup is
//! logged, counted, and treated as a miss; a failed store write is
//! logged and swallowed. Only the wrapped operation's own errors reach
//! the caller, and a failed generation writes nothing.
//!
//! # Races
//!
//! Two concurrent misses on the same fingerprint both invoke the
//! wrapped operation and both store; the later write wins the upsert.
//! Duplicate upstream calls under race are accepted; there is no
//! per-fingerprint singleflight layer.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::store::CacheStore;
use crate::{MuninnError, Result, telemetry};

/// Default time-to-live for cached responses: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);

/// An operand whose generation calls can be memoized.
///
/// The identity string participates in the cache key, so two operands
/// with different identities never share entries even for identical
/// prompts.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Identity of the underlying operand, e.g. the model name.
    fn identity(&self) -> &str;

    /// Produce a response for `prompt` under an optional request context.
    async fn generate(&self, prompt: &str, context: Option<&Value>) -> Result<String>;
}

/// Cache-first wrapper around a [`Generator`].
///
/// Implements [`Generator`] itself, so callers (and further wrappers)
/// cannot tell a wrapped operand from a bare one.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # fn demo(model: impl muninn::Generator, store: Arc<muninn::CacheStore>) {
/// let cached = muninn::Cached::new(model, store).ttl(Duration::from_secs(48 * 3600));
/// # }
/// ```
pub struct Cached<G> {
    inner: G,
    store: Arc<CacheStore>,
    ttl: Duration,
}

impl<G: Generator> Cached<G> {
    /// Wrap an operand with cache-first semantics and the default TTL.
    pub fn new(inner: G, store: Arc<CacheStore>) -> Self {
        Self {
            inner,
            store,
            ttl: DEFAULT_TTL,
        }
    }

    /// Set the time-to-live applied to responses this wrapper stores.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Access the wrapped operand.
    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// Unwrap, returning the inner operand.
    pub fn into_inner(self) -> G {
        self.inner
    }
}

#[async_trait]
impl<G: Generator> Generator for Cached<G> {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    async fn generate(&self, prompt: &str, context: Option<&Value>) -> Result<String> {
        match self.store.get(self.identity(), prompt, context).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => {}
            // Unhashable inputs can never produce a usable entry; fail
            // fast rather than generating a response we could not store.
            Err(e @ MuninnError::KeyDerivation(_)) => return Err(e),
            // A broken store degrades to "always miss": generation is
            // never blocked by cache availability.
            Err(e) => {
                warn!("cache lookup failed, falling back to generation: {e}");
                metrics::counter!(telemetry::STORE_ERRORS_TOTAL, "operation" => "get")
                    .increment(1);
            }
        }

        let response = self.inner.generate(prompt, context).await?;

        // Empty responses are returned but never cached.
        if !response.is_empty()
            && let Err(e) = self
                .store
                .set(self.identity(), prompt, &response, context, self.ttl)
                .await
        {
            warn!("failed to populate response cache: {e}");
            metrics::counter!(telemetry::STORE_ERRORS_TOTAL, "operation" => "set").increment(1);
        }

        Ok(response)
    }
}
