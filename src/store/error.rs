use thiserror::Error;

/// Failure of a single replica operation.
///
/// These never reach the caller of a lock operation: the fan-out counts a
/// failed replica as a non-success and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The replica could not be reached (connection refused, timeout, offline).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A lock guarding the replica's local state was poisoned.
    #[error("store poisoned: {0}")]
    Poisoned(String),
    /// The replica rejected or failed to execute the command.
    #[error("store command failed: {0}")]
    Command(String),
}
