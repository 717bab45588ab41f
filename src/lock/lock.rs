//! The quorum lock state machine.
//!
//! A `QuorumLock` is either unlocked or holds an ownership token together
//! with the instant until which the lock is known to be valid. Every
//! operation fans out to all replicas and only trusts the outcome when a
//! majority agreed.
//!
//! The validity deadline of an acquisition is
//! `end + expiry - (end - start) - expiry * drift_factor`, where `start` and
//! `end` bracket the fan-out. The replicas started their TTL somewhere inside
//! that window, so the deadline is conservative with respect to every one of
//! them, and the drift margin absorbs clock-rate differences.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::fan_out::act_on_stores;
use super::{LockError, LockOptions};
use crate::store::Replicas;

struct Held {
    token: String,
    until: Instant,
}

/// A distributed mutex over a fixed replica set.
///
/// Obtained from a `LockManager`. All mutating operations take `&mut self`:
/// one instance has exactly one owner at a time. Share the manager, not the
/// lock, when several threads contend for the same resource.
///
/// ## Example
///
/// ```
/// use redlock_rust::{InMemoryStore, LockManager, LockStore};
/// use std::sync::Arc;
///
/// let stores: Vec<Arc<dyn LockStore>> = (0..3)
///     .map(|_| Arc::new(InMemoryStore::new()) as Arc<dyn LockStore>)
///     .collect();
/// let manager = LockManager::new(stores);
///
/// let mut lock = manager.new_lock("orders:42");
/// lock.lock().unwrap();
/// assert!(lock.is_valid());
///
/// assert!(lock.extend());
/// assert!(lock.unlock());
/// assert!(!lock.is_locked());
/// ```
pub struct QuorumLock {
    name: String,
    options: LockOptions,
    quorum: usize,
    stores: Replicas,
    held: Option<Held>,
}

impl QuorumLock {
    pub(crate) fn new(name: String, options: LockOptions, quorum: usize, stores: Replicas) -> Self {
        QuorumLock {
            name,
            options,
            quorum,
            stores,
            held: None,
        }
    }

    /// Acquire the lock, retrying up to `options.tries` times.
    ///
    /// A fresh token is generated once per call and reused across attempts.
    /// After a failed attempt any replicas that did accept the token are
    /// cleaned up before waiting for the next one.
    pub fn lock(&mut self) -> Result<(), LockError> {
        let token = (self.options.token_generator)()?;
        let tries = self.options.tries.max(1);
        let expiry = self.options.expiry;
        let name = self.name.as_str();

        for attempt in 0..tries {
            if attempt > 0 {
                thread::sleep((self.options.retry_delay)(attempt));
            }

            let start = Instant::now();
            let acquired =
                act_on_stores(&self.stores, |store| store.conditional_set(name, &token, expiry));
            let end = Instant::now();
            let until = self.validity_deadline(start, end);

            debug!(
                lock = name,
                attempt = attempt + 1,
                acquired,
                quorum = self.quorum,
                elapsed_ms = (end - start).as_millis() as u64,
                "acquire attempt"
            );

            if acquired >= self.quorum {
                if let Some(until) = until {
                    info!(lock = name, attempt = attempt + 1, "lock acquired");
                    self.held = Some(Held { token, until });
                    return Ok(());
                }
            }

            act_on_stores(&self.stores, |store| store.conditional_delete(name, &token));
        }

        warn!(lock = name, tries, "lock not acquired, attempts exhausted");
        Err(LockError::AcquireFailed {
            name: self.name.clone(),
            tries,
        })
    }

    /// Release the lock on every replica still holding this instance's token.
    ///
    /// Returns `true` when a quorum of replicas released it; the instance is
    /// then unlocked. On `false` the token is kept so the caller can retry.
    pub fn unlock(&mut self) -> bool {
        let name = self.name.as_str();
        let Some(held) = &self.held else {
            warn!(lock = name, "unlock called on a lock that is not held");
            return false;
        };

        let released =
            act_on_stores(&self.stores, |store| store.conditional_delete(name, &held.token));
        if released < self.quorum {
            warn!(lock = name, released, quorum = self.quorum, "unlock missed quorum");
            return false;
        }

        info!(lock = name, "lock released");
        self.held = None;
        true
    }

    /// Reset the TTL on every replica still holding this instance's token.
    ///
    /// On quorum the validity deadline is recomputed from this round trip
    /// exactly as `lock` computes it. If the round trip itself ate the whole
    /// validity window the extend is reported as failed and the previous
    /// deadline stands.
    pub fn extend(&mut self) -> bool {
        let name = self.name.as_str();
        let expiry = self.options.expiry;
        let Some(held) = &self.held else {
            warn!(lock = name, "extend called on a lock that is not held");
            return false;
        };

        let start = Instant::now();
        let extended = act_on_stores(&self.stores, |store| {
            store.conditional_extend(name, &held.token, expiry)
        });
        let end = Instant::now();

        if extended < self.quorum {
            warn!(lock = name, extended, quorum = self.quorum, "extend missed quorum");
            return false;
        }

        match self.validity_deadline(start, end) {
            Some(until) => {
                if let Some(held) = self.held.as_mut() {
                    held.until = until;
                }
                debug!(lock = name, extended, "lock extended");
                true
            }
            None => {
                warn!(lock = name, "extend took longer than the validity window");
                false
            }
        }
    }

    /// `None` when the round trip plus drift margin used up the whole expiry,
    /// or when the deadline is too far out to represent.
    fn validity_deadline(&self, start: Instant, end: Instant) -> Option<Instant> {
        let validity = self
            .options
            .expiry
            .checked_sub(end - start)?
            .checked_sub(self.options.drift())?;
        if validity.is_zero() {
            return None;
        }
        end.checked_add(validity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ownership token of the current hold.
    pub fn token(&self) -> Option<&str> {
        self.held.as_ref().map(|h| h.token.as_str())
    }

    /// Instant until which the current hold is known to be valid.
    pub fn until(&self) -> Option<Instant> {
        self.held.as_ref().map(|h| h.until)
    }

    /// Whether the last acquire succeeded and no release has happened since.
    /// Says nothing about expiry; see `is_valid`.
    pub fn is_locked(&self) -> bool {
        self.held.is_some()
    }

    pub fn is_valid(&self) -> bool {
        self.until().is_some_and(|until| Instant::now() < until)
    }

    /// Time left before the validity deadline, zero when unlocked or expired.
    pub fn remaining(&self) -> Duration {
        self.until()
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }
}

impl fmt::Debug for QuorumLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuorumLock")
            .field("name", &self.name)
            .field("quorum", &self.quorum)
            .field("replicas", &self.stores.len())
            .field("locked", &self.is_locked())
            .field("until", &self.until())
            .finish()
    }
}
