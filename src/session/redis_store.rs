//! Redis-backed session store.
//!
//! Each session is one Redis hash keyed by the session id. Values are stored
//! as JSON text, one hash field per session key, and the whole hash carries
//! the idle expiry. Enabled with the `redis-store` feature.

use redis::{Client, Commands, Connection, RedisError, Script};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Session, SessionError, SharedSession, Store};

/// Sets a field only while the hash still exists, so a write never revives
/// an expired session. Returns -1 when the session is gone.
const SET_IF_LIVE: &str = r#"
if redis.call("exists", KEYS[1]) == 1 then
    return redis.call("hset", KEYS[1], ARGV[1], ARGV[2])
else
    return -1
end
"#;

fn backend(e: &RedisError) -> SessionError {
    SessionError::Backend {
        reason: e.to_string(),
    }
}

fn connect(client: &Client) -> Result<Connection, SessionError> {
    client.get_connection().map_err(|e| backend(&e))
}

/// Expiry in whole milliseconds, at least one so a key is never made eternal
fn expiry_millis(expiration: Duration) -> i64 {
    i64::try_from(expiration.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Handle to one session hash
pub struct RedisSession {
    client: Client,
    id: String,
}

impl Session for RedisSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Value, SessionError> {
        let raw: Option<String> = connect(&self.client)?
            .hget(&self.id, key)
            .map_err(|e| backend(&e))?;
        let raw = raw.ok_or_else(|| SessionError::KeyNotFound {
            key: key.to_string(),
        })?;
        // values written by other clients may not be JSON
        Ok(serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut con = connect(&self.client)?;
        let written: i64 = Script::new(SET_IF_LIVE)
            .key(&self.id)
            .arg(key)
            .arg(value.to_string())
            .invoke(&mut con)
            .map_err(|e| backend(&e))?;
        if written < 0 {
            return Err(SessionError::NotFound {
                id: self.id.clone(),
            });
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        connect(&self.client)?
            .hdel::<_, _, ()>(&self.id, key)
            .map_err(|e| backend(&e))
    }
}

/// [`Store`] keeping sessions in Redis with a fixed idle expiry
///
/// Every operation opens its own connection from the client, so the store
/// can be shared across coroutines without a lock. Expiry is left to Redis.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    expiration: Duration,
}

impl RedisStore {
    #[must_use]
    pub fn new(client: Client, expiration: Duration) -> Self {
        Self { client, expiration }
    }

    /// Store for the server at `url` (e.g. `redis://127.0.0.1/`)
    ///
    /// # Errors
    ///
    /// [`SessionError::Backend`] if `url` is not a valid Redis URL. No
    /// connection is made here.
    pub fn open(url: &str, expiration: Duration) -> Result<Self, SessionError> {
        let client = Client::open(url).map_err(|e| backend(&e))?;
        Ok(Self::new(client, expiration))
    }

    fn session(&self, id: &str) -> SharedSession {
        Arc::new(RedisSession {
            client: self.client.clone(),
            id: id.to_string(),
        })
    }
}

impl Store for RedisStore {
    fn generate(&self, id: &str) -> Result<SharedSession, SessionError> {
        let mut con = connect(&self.client)?;
        // the id doubles as a placeholder field so the hash exists before
        // any value is set
        redis::pipe()
            .atomic()
            .del(id)
            .ignore()
            .hset(id, id, id)
            .ignore()
            .pexpire(id, expiry_millis(self.expiration))
            .ignore()
            .query::<()>(&mut con)
            .map_err(|e| backend(&e))?;
        debug!(session_id = %id, "Redis session generated");
        Ok(self.session(id))
    }

    fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        let exists: bool = connect(&self.client)?
            .exists(id)
            .map_err(|e| backend(&e))?;
        if !exists {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(self.session(id))
    }

    fn refresh(&self, id: &str) -> Result<(), SessionError> {
        let extended: bool = connect(&self.client)?
            .pexpire(id, expiry_millis(self.expiration))
            .map_err(|e| backend(&e))?;
        if !extended {
            return Err(SessionError::NotFound { id: id.to_string() });
        }
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<(), SessionError> {
        connect(&self.client)?
            .del::<_, ()>(id)
            .map_err(|e| backend(&e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_millis_bounds() {
        assert_eq!(expiry_millis(Duration::from_secs(30)), 30_000);
        assert_eq!(expiry_millis(Duration::from_micros(10)), 1);
        assert_eq!(expiry_millis(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_open_rejects_bad_url() {
        assert!(matches!(
            RedisStore::open("not a url", Duration::from_secs(1)),
            Err(SessionError::Backend { .. })
        ));
        assert!(RedisStore::open("redis://127.0.0.1:6379/", Duration::from_secs(1)).is_ok());
    }
}
