mod error;
mod in_memory;
#[cfg(feature = "redis")]
mod redis;
mod store;

use std::sync::Arc;

pub use error::StoreError;
pub use in_memory::{InMemoryStore, StoreStats};
#[cfg(feature = "redis")]
pub use self::redis::{RedisStore, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RESPONSE_TIMEOUT};
pub use store::LockStore;

/// The fixed, ordered set of replicas a lock runs against.
///
/// Shared read-only by every lock a `LockManager` hands out.
pub type Replicas = Arc<[Arc<dyn LockStore>]>;
