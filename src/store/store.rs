use std::time::Duration;

use super::StoreError;

/// The atomic operations a lock needs from one key-value store replica.
///
/// Each method must execute as a single indivisible step on the replica.
/// A read followed by a separate write is not acceptable: another client
/// could take the key over in between. Redis implementations use `SET NX`
/// and server-side scripts; other stores can use transactions or native
/// compare-and-swap.
pub trait LockStore: Send + Sync {
    /// Set `key` to `value` with the given time-to-live, only if `key` is absent.
    /// Returns `Ok(true)` if the key was set.
    fn conditional_set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Delete `key` only if it currently holds `value`.
    /// Returns `Ok(true)` if the key was deleted.
    fn conditional_delete(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Reset the time-to-live of `key` only if it currently holds `value`.
    /// Returns `Ok(true)` if the expiry was updated.
    fn conditional_extend(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, StoreError>;
}
