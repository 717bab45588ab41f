use std::sync::Arc;

use super::{LockOptions, QuorumLock};
use crate::store::{LockStore, Replicas};

/// Factory for `QuorumLock`s over a fixed replica set.
///
/// The replica set and the quorum (`N / 2 + 1`) are fixed when the manager is
/// built. Every lock handed out shares the same read-only replica list, so
/// a manager can be cloned or wrapped in an `Arc` and used from many
/// threads, each creating its own lock instances.
#[derive(Clone)]
pub struct LockManager {
    stores: Replicas,
    quorum: usize,
    options: LockOptions,
}

impl LockManager {
    /// An empty replica set is accepted, but no lock can ever be acquired
    /// from it.
    pub fn new(stores: Vec<Arc<dyn LockStore>>) -> Self {
        Self::with_options(stores, LockOptions::default())
    }

    /// Like `new`, with manager-wide default options for every lock.
    pub fn with_options(stores: Vec<Arc<dyn LockStore>>, options: LockOptions) -> Self {
        let quorum = stores.len() / 2 + 1;
        LockManager {
            stores: stores.into(),
            quorum,
            options,
        }
    }

    /// A new, unlocked lock for `name` using the manager's default options.
    pub fn new_lock(&self, name: impl Into<String>) -> QuorumLock {
        self.new_lock_with(name, self.options.clone())
    }

    pub fn new_lock_with(&self, name: impl Into<String>, options: LockOptions) -> QuorumLock {
        QuorumLock::new(name.into(), options, self.quorum, Arc::clone(&self.stores))
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn replica_count(&self) -> usize {
        self.stores.len()
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }
}
