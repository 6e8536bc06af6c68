//! Cache Entry Module
//!
//! Defines how long an entry lives and when it counts as expired.

use std::time::{Duration, Instant};

// == TTL ==
/// Lifetime requested for a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The entry never expires and is kept in the segment's permanent map
    Never,
    /// The entry expires once this much time has passed since the write
    After(Duration),
}

impl Ttl {
    // == Deadline ==
    /// Resolves the TTL to an absolute expiration instant.
    ///
    /// # Returns
    /// - `None` for `Ttl::Never`, or when `now + ttl` does not fit in an `Instant`
    /// - `Some(deadline)` otherwise
    pub fn deadline(self, now: Instant) -> Option<Instant> {
        match self {
            Ttl::Never => None,
            Ttl::After(ttl) => now.checked_add(ttl),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

// == Is Expired ==
/// Checks whether an entry with the given deadline has expired.
///
/// Boundary condition: an entry is expired once the current time is greater
/// than or equal to its deadline, so a zero TTL is expired immediately.
pub fn is_expired(expires_at: Instant, now: Instant) -> bool {
    now >= expires_at
}
