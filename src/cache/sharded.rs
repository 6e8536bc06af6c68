//! Sharded Cache Module
//!
//! The public cache: a fixed set of segments, each key routed to one of them.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::cache::router::route;
use crate::cache::{Segment, Ttl, DEFAULT_SEGMENT_COUNT, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Cache ==
/// Thread-safe in-process cache with per-entry TTL.
///
/// Values are stored behind `Arc`, so a `get` hands back a shared handle
/// rather than a copy. Share the cache itself across threads with `Arc`.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use shard_cache::{Cache, NO_EXPIRATION};
///
/// let cache: Cache<String> = Cache::new(4).unwrap();
/// cache.set("session", "abc".to_string(), Duration::from_secs(30));
/// cache.set("motd", "hello".to_string(), NO_EXPIRATION);
///
/// assert_eq!(cache.get("session").as_deref().map(String::as_str), Some("abc"));
/// assert_eq!(cache.size(), 2);
/// ```
pub struct Cache<V> {
    segments: Box<[Segment<V>]>,
    default_ttl: Duration,
}

impl<V> Cache<V>
where
    V: Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with `segment_count` segments and default sweep interval and TTL.
    pub fn new(segment_count: usize) -> Result<Self> {
        Self::with_settings(segment_count, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL)
    }

    /// Creates a cache with the default segment count, sweep interval and TTL.
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_SEGMENT_COUNT)
    }

    /// Creates a cache from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Self::with_settings(
            config.segment_count,
            config.cleanup_interval(),
            config.default_ttl(),
        )
    }

    /// Creates a cache with explicit settings.
    ///
    /// # Arguments
    /// * `segment_count` - Number of segments, fixed for the cache's lifetime
    /// * `sweep_interval` - How often each segment's janitor runs
    /// * `default_ttl` - TTL applied by `set_default` and `add_default`
    ///
    /// # Errors
    /// `InvalidConfig` for a zero segment count or sweep interval, `Io` if a
    /// janitor thread cannot be started.
    pub fn with_settings(
        segment_count: usize,
        sweep_interval: Duration,
        default_ttl: Duration,
    ) -> Result<Self> {
        if segment_count == 0 {
            return Err(CacheError::InvalidConfig(
                "segment count must be at least 1".to_string(),
            ));
        }
        if sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let segments = (0..segment_count)
            .map(|id| Segment::new(id, sweep_interval))
            .collect::<Result<Vec<_>>>()?;

        info!(
            segments = segment_count,
            ?sweep_interval,
            ?default_ttl,
            "Cache initialized"
        );

        Ok(Self {
            segments: segments.into_boxed_slice(),
            default_ttl,
        })
    }
}

impl<V> Cache<V> {
    fn segment(&self, key: &str) -> &Segment<V> {
        &self.segments[route(key, self.segments.len())]
    }

    // == Set Default ==
    /// Stores `value` under `key` with the default TTL.
    pub fn set_default(&self, key: &str, value: impl Into<Arc<V>>) {
        self.set(key, value, self.default_ttl);
    }

    // == Add Default ==
    /// Stores `value` with the default TTL unless `key` already has a live entry.
    pub fn add_default(&self, key: &str, value: impl Into<Arc<V>>) -> bool {
        self.add(key, value, self.default_ttl)
    }

    // == Set ==
    /// Stores `value` under `key`, overwriting any previous value.
    ///
    /// `ttl` is a `Duration` or `NO_EXPIRATION`.
    pub fn set(&self, key: &str, value: impl Into<Arc<V>>, ttl: impl Into<Ttl>) {
        self.segment(key).set(key, value.into(), ttl.into());
    }

    // == Add ==
    /// Stores `value` only if `key` has no live entry.
    ///
    /// Returns `true` when the value was written.
    pub fn add(&self, key: &str, value: impl Into<Arc<V>>, ttl: impl Into<Ttl>) -> bool {
        self.segment(key).add(key, value.into(), ttl.into())
    }

    // == Get ==
    /// Returns the value for `key`, or `None` if it is missing or expired.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        self.segment(key).get(key)
    }

    // == Remove ==
    /// Deletes `key`, returning its value if it was live.
    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        self.segment(key).remove(key)
    }

    // == Size ==
    /// Approximate number of entries across all segments.
    ///
    /// Segments are read one after another, so concurrent writers can make
    /// the total momentarily inconsistent. Expired entries count until a
    /// read or the janitor reclaims them.
    pub fn size(&self) -> usize {
        self.segments.iter().map(Segment::size).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stops every janitor and waits for the threads to exit.
    ///
    /// The cache keeps serving reads and writes; expired entries are then
    /// only reclaimed on access.
    pub fn shutdown(&mut self) {
        for segment in self.segments.iter_mut() {
            segment.shutdown();
        }
    }

    #[cfg(test)]
    pub(crate) fn segments(&self) -> &[Segment<V>] {
        &self.segments
    }
}
