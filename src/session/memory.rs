use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{Session, SessionError, SharedSession, Store};

/// Session data held in process memory
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    values: DashMap<String, Value>,
}

impl MemorySession {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            values: DashMap::new(),
        }
    }
}

impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Result<Value, SessionError> {
        self.values
            .get(key)
            .map(|v| v.value().clone())
            .ok_or_else(|| SessionError::KeyNotFound {
                key: key.to_string(),
            })
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.values.remove(key);
        Ok(())
    }
}

struct Entry {
    session: Arc<MemorySession>,
    expires_at: Instant,
}

/// How often the background janitor sweeps expired sessions by default
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(1);

struct Sessions {
    entries: DashMap<String, Entry>,
    expiration: Duration,
}

impl Sessions {
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "Purged expired sessions");
        }
        removed
    }
}

/// Sweep expired sessions every `interval` until the store is dropped.
fn start_janitor(sessions: &Arc<Sessions>, interval: Duration) {
    let weak: Weak<Sessions> = Arc::downgrade(sessions);
    let spawned = thread::Builder::new()
        .name("brrtweb-session-janitor".into())
        .spawn(move || loop {
            thread::sleep(interval);
            let Some(sessions) = weak.upgrade() else {
                break;
            };
            sessions.purge_expired();
        });
    if let Err(e) = spawned {
        warn!(error = %e, "Session janitor not started, expired sessions go on lookup only");
    }
}

/// In-process [`Store`] with a fixed idle expiry
///
/// A background thread drops expired sessions every purge interval, so
/// abandoned sessions do not pile up. Lookups of an expired id also drop it
/// on the spot. The thread exits once the store is dropped.
pub struct MemoryStore {
    sessions: Arc<Sessions>,
}

impl MemoryStore {
    /// Store whose sessions expire after `expiration`, swept every second
    #[must_use]
    pub fn new(expiration: Duration) -> Self {
        Self::with_purge_interval(expiration, DEFAULT_PURGE_INTERVAL)
    }

    #[must_use]
    pub fn with_purge_interval(expiration: Duration, purge_interval: Duration) -> Self {
        let sessions = Arc::new(Sessions {
            entries: DashMap::new(),
            expiration,
        });
        start_janitor(&sessions, purge_interval);
        Self { sessions }
    }

    /// Number of sessions currently held, expired or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.entries.is_empty()
    }

    /// Drop every expired session now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired()
    }
}

impl Store for MemoryStore {
    fn generate(&self, id: &str) -> Result<SharedSession, SessionError> {
        let session = Arc::new(MemorySession::new(id));
        self.sessions.entries.insert(
            id.to_string(),
            Entry {
                session: Arc::clone(&session),
                expires_at: Instant::now() + self.sessions.expiration,
            },
        );
        Ok(session)
    }

    fn get(&self, id: &str) -> Result<SharedSession, SessionError> {
        let now = Instant::now();
        let entries = &self.sessions.entries;
        let live = entries
            .get(id)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| Arc::clone(&entry.session));
        match live {
            Some(session) => Ok(session),
            None => {
                entries.remove_if(id, |_, entry| entry.expires_at <= now);
                Err(SessionError::NotFound { id: id.to_string() })
            }
        }
    }

    fn refresh(&self, id: &str) -> Result<(), SessionError> {
        let now = Instant::now();
        match self.sessions.entries.get_mut(id) {
            Some(mut entry) if entry.expires_at > now => {
                entry.expires_at = now + self.sessions.expiration;
                Ok(())
            }
            _ => Err(SessionError::NotFound { id: id.to_string() }),
        }
    }

    fn remove(&self, id: &str) -> Result<(), SessionError> {
        self.sessions.entries.remove(id);
        Ok(())
    }
}
