use std::time::Duration;

use ::redis::{Client, Connection, RedisError, Script};

use super::{LockStore, StoreError};

const DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Default bound on establishing a connection to one replica.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Default bound on each read and write once connected.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_timeout() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// A single Redis server acting as one lock replica.
///
/// Conditional set is `SET key value NX PX ttl`; conditional delete and
/// extend are Lua scripts so the compare and the write happen in one step
/// on the server.
///
/// Every connection is bounded by a connect timeout and a response timeout,
/// so an unresponsive server fails its own fan-out task instead of stalling
/// the lock operation.
pub struct RedisStore {
    client: Client,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisStore {
    pub fn new(client: Client) -> Self {
        RedisStore {
            client,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Open a replica from a `redis://` URL.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self::new(Client::open(url)?))
    }

    /// Bound the time spent establishing each connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = non_zero(timeout, DEFAULT_CONNECT_TIMEOUT);
        self
    }

    /// Bound every read and write on an established connection.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = non_zero(timeout, DEFAULT_RESPONSE_TIMEOUT);
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = self
            .client
            .get_connection_with_timeout(self.connect_timeout)?;
        conn.set_read_timeout(Some(self.response_timeout))?;
        conn.set_write_timeout(Some(self.response_timeout))?;
        Ok(conn)
    }
}

/// A zero socket timeout is rejected by the OS, so fall back to the default.
fn non_zero(timeout: Duration, default: Duration) -> Duration {
    if timeout.is_zero() {
        default
    } else {
        timeout
    }
}

fn millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by the server; oversized values are left for the
    // server to reject.
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl LockStore for RedisStore {
    fn conditional_set(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query(&mut conn)?;
        Ok(reply.is_some())
    }

    fn conditional_delete(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        let deleted: i64 = Script::new(DELETE_SCRIPT)
            .key(key)
            .arg(value)
            .invoke(&mut conn)?;
        Ok(deleted == 1)
    }

    fn conditional_extend(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection()?;
        let extended: i64 = Script::new(EXTEND_SCRIPT)
            .key(key)
            .arg(value)
            .arg(millis(ttl))
            .invoke(&mut conn)?;
        Ok(extended == 1)
    }
}
