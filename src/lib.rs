//! Shard Cache - an in-process sharded key-value cache
//!
//! Keys are spread over independently locked segments. Each entry carries an
//! optional TTL; expired entries are reclaimed on read and by a per-segment
//! janitor thread.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, Ttl, NO_EXPIRATION};
pub use config::Config;
pub use error::{CacheError, Result};
