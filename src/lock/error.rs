use thiserror::Error;

/// The token generator could not produce an ownership token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TokenError(pub String);

/// Error type for lock operations.
///
/// Only acquisition can fail with an error. Release and extend report a
/// missed quorum as `false` so the caller decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The ownership token could not be generated. Never retried.
    #[error("lock token generation failed: {0}")]
    Generation(#[from] TokenError),
    /// Quorum was not reached within the validity window on any attempt.
    #[error("lock acquire failed: {name} not acquired after {tries} attempts")]
    AcquireFailed { name: String, tries: u32 },
}
