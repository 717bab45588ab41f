mod error;
mod fan_out;
mod lock;
mod lock_manager;
mod options;
mod token;

pub use error::{LockError, TokenError};
pub use lock::QuorumLock;
pub use lock_manager::LockManager;
pub use options::{
    LockOptions, LockSettings, RetryDelay, DEFAULT_DRIFT_FACTOR, DEFAULT_EXPIRY,
    DEFAULT_RETRY_DELAY, DEFAULT_TRIES,
};
pub use token::{random_token, TokenGenerator, TOKEN_BYTES};
