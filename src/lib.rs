//! Redlock-style distributed mutex over independent key-value stores.
//!
//! A `LockManager` is built from N replica connections. Each `QuorumLock`
//! it hands out acquires, extends and releases its key on all replicas
//! concurrently and succeeds only when a majority (`N / 2 + 1`) agreed in
//! time, so the lock survives the loss of a minority of replicas.

mod lock;
pub mod store;

pub use lock::{
    random_token, LockError, LockManager, LockOptions, LockSettings, QuorumLock, RetryDelay,
    TokenError, TokenGenerator, DEFAULT_DRIFT_FACTOR, DEFAULT_EXPIRY, DEFAULT_RETRY_DELAY,
    DEFAULT_TRIES, TOKEN_BYTES,
};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use store::{InMemoryStore, LockStore, Replicas, StoreError, StoreStats};
