use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::token::{random_token, TokenGenerator};
use super::TokenError;

pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(8);
pub const DEFAULT_TRIES: u32 = 32;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_DRIFT_FACTOR: f64 = 0.01;

/// Decides how long to wait before the next acquire attempt.
///
/// Called with the number of attempts already made, so the wait before the
/// second attempt is `retry_delay(1)`.
pub type RetryDelay = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// Tunables for a `QuorumLock`.
///
/// ## Example
///
/// ```
/// use redlock_rust::LockOptions;
/// use std::time::Duration;
///
/// let options = LockOptions::default()
///     .with_expiry(Duration::from_secs(2))
///     .with_tries(5)
///     .with_constant_retry_delay(Duration::from_millis(50));
///
/// assert_eq!(options.tries, 5);
/// ```
#[derive(Clone)]
pub struct LockOptions {
    /// Time-to-live requested from every replica on each acquire or extend.
    pub expiry: Duration,
    /// Maximum number of acquire attempts, at least 1.
    pub tries: u32,
    pub retry_delay: RetryDelay,
    /// Fraction of `expiry` held back to absorb clock drift between replicas.
    pub drift_factor: f64,
    pub token_generator: TokenGenerator,
}

impl Default for LockOptions {
    fn default() -> Self {
        LockOptions {
            expiry: DEFAULT_EXPIRY,
            tries: DEFAULT_TRIES,
            retry_delay: Arc::new(|_: u32| DEFAULT_RETRY_DELAY),
            drift_factor: DEFAULT_DRIFT_FACTOR,
            token_generator: Arc::new(random_token),
        }
    }
}

impl fmt::Debug for LockOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockOptions")
            .field("expiry", &self.expiry)
            .field("tries", &self.tries)
            .field("drift_factor", &self.drift_factor)
            .finish_non_exhaustive()
    }
}

impl LockOptions {
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    pub fn with_retry_delay<F>(mut self, retry_delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.retry_delay = Arc::new(retry_delay);
        self
    }

    pub fn with_constant_retry_delay(self, delay: Duration) -> Self {
        self.with_retry_delay(move |_| delay)
    }

    /// Clamped to `[0.0, 1.0)`; a factor of 1 or more could never yield a
    /// valid lock.
    pub fn with_drift_factor(mut self, drift_factor: f64) -> Self {
        self.drift_factor = sanitize_drift_factor(drift_factor);
        self
    }

    pub fn with_token_generator<F>(mut self, token_generator: F) -> Self
    where
        F: Fn() -> Result<String, TokenError> + Send + Sync + 'static,
    {
        self.token_generator = Arc::new(token_generator);
        self
    }

    /// The safety margin subtracted from every validity window.
    ///
    /// `drift_factor` is public, so it is clamped again here.
    pub fn drift(&self) -> Duration {
        let factor = sanitize_drift_factor(self.drift_factor);
        Duration::try_from_secs_f64(self.expiry.as_secs_f64() * factor).unwrap_or(self.expiry)
    }
}

fn sanitize_drift_factor(drift_factor: f64) -> f64 {
    if drift_factor.is_finite() {
        drift_factor.clamp(0.0, 0.99)
    } else {
        DEFAULT_DRIFT_FACTOR
    }
}

/// Serializable subset of `LockOptions`, for loading from config files.
///
/// Missing fields take the defaults. The retry delay is constant and the
/// token generator is always the built-in random one.
///
/// ```
/// use redlock_rust::LockSettings;
///
/// let settings = LockSettings::from_json(r#"{ "expiry_ms": 3000, "tries": 3 }"#).unwrap();
/// assert_eq!(settings.expiry_ms, 3000);
/// assert_eq!(settings.retry_delay_ms, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    pub expiry_ms: u64,
    pub tries: u32,
    pub retry_delay_ms: u64,
    pub drift_factor: f64,
}

impl Default for LockSettings {
    fn default() -> Self {
        LockSettings {
            expiry_ms: DEFAULT_EXPIRY.as_millis() as u64,
            tries: DEFAULT_TRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            drift_factor: DEFAULT_DRIFT_FACTOR,
        }
    }
}

impl LockSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn into_options(self) -> LockOptions {
        LockOptions::default()
            .with_expiry(Duration::from_millis(self.expiry_ms))
            .with_tries(self.tries)
            .with_constant_retry_delay(Duration::from_millis(self.retry_delay_ms))
            .with_drift_factor(self.drift_factor)
    }
}

impl From<LockSettings> for LockOptions {
    fn from(settings: LockSettings) -> Self {
        settings.into_options()
    }
}
