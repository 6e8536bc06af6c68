//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache.
//!
//! # Tasks
//! - Janitor: evicts expired entries from one segment at a fixed interval

mod janitor;

pub use janitor::{Janitor, SWEEP_BATCH};
