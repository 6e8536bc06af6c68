//! Cache Module
//!
//! Provides a sharded in-memory cache with per-entry TTL and background sweeping.
//!
//! # Layout
//! - `router` - maps keys to segments
//! - `store` - TTL-bearing entries ordered by expiration time
//! - `segment` - one shard: permanent map, expiring store and janitor
//! - `sharded` - the public `Cache` facade

mod entry;
mod router;
mod segment;
mod sharded;
mod store;


use std::time::Duration;

// Re-export public types
pub use entry::Ttl;
pub use router::{fnv32, route};
pub use segment::Segment;
pub use sharded::Cache;
pub use store::ExpiringStore;

// == Public Constants ==
/// TTL for entries that never expire
pub const NO_EXPIRATION: Ttl = Ttl::Never;

/// Default number of segments
pub const DEFAULT_SEGMENT_COUNT: usize = 16;

/// TTL applied by `set_default` / `add_default`
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// How often each segment's janitor sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Maximum allowed key length in bytes (enforced by the HTTP layer)
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes (enforced by the HTTP layer)
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
