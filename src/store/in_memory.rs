//! In-memory replica for testing and single-process scenarios.
//!
//! An `InMemoryStore` behaves like one independent key-value server:
//! keys carry an expiry and vanish once it passes, and every conditional
//! operation runs under a single mutex so it is atomic with respect to
//! other clients of the same replica. Handles are cheap to clone and all
//! clones share the same keyspace, so a test can keep one handle for
//! inspection while a `LockManager` owns another.
//!
//! Faults can be injected at runtime:
//! - `set_online(false)` makes every operation fail with `StoreError::Unavailable`
//! - `set_latency(d)` delays every operation by `d` before it runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use super::{LockStore, StoreError};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Number of operations a replica has received, including those that
/// failed because the replica was offline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub sets: usize,
    pub deletes: usize,
    pub extends: usize,
}

#[derive(Clone)]
pub struct InMemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    online: Arc<AtomicBool>,
    latency: Arc<Mutex<Duration>>,
    stats: Arc<Mutex<StoreStats>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            online: Arc::new(AtomicBool::new(true)),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
            stats: Arc::new(Mutex::new(StoreStats::default())),
        }
    }

    /// Take the replica offline (or bring it back).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Delay every subsequent operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Current value of `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone())
    }

    /// Remaining time-to-live of `key`, if present and not expired.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.expires_at - now)
    }

    pub fn stats(&self) -> StoreStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop every key, as a replica restarting without persistence would.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Record the call, apply injected latency, then fail if offline.
    fn enter(&self, record: impl FnOnce(&mut StoreStats)) -> Result<(), StoreError> {
        {
            let mut stats = self
                .stats
                .lock()
                .map_err(|_| StoreError::Poisoned("replica stats".into()))?;
            record(&mut stats);
        }

        let latency = *self
            .latency
            .lock()
            .map_err(|_| StoreError::Poisoned("replica latency".into()))?;
        if !latency.is_zero() {
            thread::sleep(latency);
        }

        if !self.is_online() {
            return Err(StoreError::Unavailable("replica offline".into()));
        }
        Ok(())
    }

    /// Lock the keyspace with expired keys already purged.
    fn live_entries(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Poisoned("replica keyspace".into()))?;
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        Ok(entries)
    }
}

fn expiry_from_now(ttl: Duration) -> Result<Instant, StoreError> {
    Instant::now()
        .checked_add(ttl)
        .ok_or_else(|| StoreError::Command(format!("ttl out of range: {:?}", ttl)))
}

impl LockStore for InMemoryStore {
    fn conditional_set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.enter(|s| s.sets += 1)?;
        let mut entries = self.live_entries()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        let expires_at = expiry_from_now(ttl)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    fn conditional_delete(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.enter(|s| s.deletes += 1)?;
        let mut entries = self.live_entries()?;
        let owned = entries.get(key).is_some_and(|e| e.value == value);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    fn conditional_extend(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.enter(|s| s.extends += 1)?;
        let mut entries = self.live_entries()?;
        match entries.get_mut(key) {
            Some(entry) if entry.value == value => {
                entry.expires_at = expiry_from_now(ttl)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
