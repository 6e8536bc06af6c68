//! Segment Module
//!
//! One shard of the cache: a permanent map for entries without a TTL, an
//! expiring store for the rest, and the janitor that sweeps that store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::cache::{ExpiringStore, Ttl};
use crate::error::Result;
use crate::tasks::Janitor;

// == Segment ==
/// An independently locked partition of the key space.
///
/// Entries written with `Ttl::Never` live in the permanent map, the rest in
/// the expiring store. Every write holds the permanent map's lock while it
/// touches the expiring store, so a key moving between the two is never
/// lost or left live twice. Locks are always taken in that order; the
/// janitor only ever takes the expiring store's.
pub struct Segment<V> {
    permanent: RwLock<HashMap<String, Arc<V>>>,
    expiring: Arc<ExpiringStore<V>>,
    janitor: Janitor,
}

impl<V> Segment<V>
where
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a segment and starts its janitor.
    ///
    /// # Arguments
    /// * `id` - Segment index, used to name the janitor thread
    /// * `sweep_interval` - How often the janitor looks for expired entries
    pub fn new(id: usize, sweep_interval: Duration) -> Result<Self> {
        let expiring = Arc::new(ExpiringStore::new());
        let janitor = Janitor::spawn(id, Arc::clone(&expiring), sweep_interval)?;

        Ok(Self {
            permanent: RwLock::new(HashMap::new()),
            expiring,
            janitor,
        })
    }
}

impl<V> Segment<V> {
    // == Set ==
    /// Stores `value` under `key`, overwriting any previous value.
    pub fn set(&self, key: &str, value: Arc<V>, ttl: Ttl) {
        let now = Instant::now();
        match ttl.deadline(now) {
            Some(expires_at) => {
                // Upgradable guards exclude each other and writers, but not readers
                let permanent = self.permanent.upgradable_read();
                self.expiring.set(key, value, expires_at);
                if permanent.contains_key(key) {
                    RwLockUpgradableReadGuard::upgrade(permanent).remove(key);
                }
            }
            None => {
                let mut permanent = self.permanent.write();
                match permanent.get_mut(key) {
                    Some(slot) => *slot = value,
                    None => {
                        permanent.insert(key.to_string(), value);
                    }
                }
                self.expiring.remove(key, now);
            }
        }
    }

    // == Add ==
    /// Stores `value` only if the sub-store matching `ttl` has no live entry for `key`.
    ///
    /// Returns `true` when the value was written. A successful add clears the
    /// key from the other sub-store, like `set`.
    pub fn add(&self, key: &str, value: Arc<V>, ttl: Ttl) -> bool {
        let now = Instant::now();
        let permanent = self.permanent.upgradable_read();
        match ttl.deadline(now) {
            Some(expires_at) => {
                let added = self.expiring.add(key, value, expires_at, now);
                if added && permanent.contains_key(key) {
                    RwLockUpgradableReadGuard::upgrade(permanent).remove(key);
                }
                added
            }
            None => {
                if permanent.contains_key(key) {
                    return false;
                }
                RwLockUpgradableReadGuard::upgrade(permanent).insert(key.to_string(), value);
                self.expiring.remove(key, now);
                true
            }
        }
    }

    // == Get ==
    /// Returns the live value for `key`, checking permanent entries first.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let permanent = self.permanent.read();
        match permanent.get(key) {
            Some(value) => Some(Arc::clone(value)),
            None => self.expiring.get(key, Instant::now()),
        }
    }

    // == Remove ==
    /// Deletes `key` from both sub-stores, returning the live value if any.
    pub fn remove(&self, key: &str) -> Option<Arc<V>> {
        let mut permanent = self.permanent.write();
        let removed = permanent.remove(key);
        let expiring = self.expiring.remove(key, Instant::now());
        removed.or(expiring)
    }

    // == Size ==
    /// Permanent entries plus expiring entries not yet reclaimed.
    pub fn size(&self) -> usize {
        let permanent = self.permanent.read();
        permanent.len() + self.expiring.len()
    }

    /// Stops this segment's janitor and waits for it to exit.
    pub fn shutdown(&mut self) {
        self.janitor.stop_and_join();
    }

    #[cfg(test)]
    pub(crate) fn expiring(&self) -> &ExpiringStore<V> {
        &self.expiring
    }

    #[cfg(test)]
    pub(crate) fn janitor_running(&self) -> bool {
        self.janitor.is_running()
    }
}
