//! Server-side sessions.
//!
//! A [`SessionManager`] ties a [`Store`] (where session data lives) to a
//! [`Propagator`] (how the session id travels with requests). The bundled
//! pair is [`MemoryStore`] and [`CookiePropagator`]; with the `redis-store`
//! feature, [`RedisStore`] keeps sessions in Redis instead.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use brrtweb::session::{CookiePropagator, MemoryStore, SessionManager};
//! use brrtweb::Context;
//!
//! let manager = SessionManager::new(
//!     Arc::new(MemoryStore::new(Duration::from_secs(1800))),
//!     Arc::new(CookiePropagator::new()),
//! );
//! let mut ctx = Context::new(http::Method::POST, "/login");
//! let session = manager.init_session(&mut ctx).unwrap();
//! session.set("user", serde_json::json!("tom")).unwrap();
//! assert!(ctx.resp_header("set-cookie").unwrap().starts_with("sessid="));
//! ```

mod cookie;
mod manager;
mod memory;
#[cfg(feature = "redis-store")]
mod redis_store;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;

pub use cookie::CookiePropagator;
pub use manager::SessionManager;
pub use memory::{MemorySession, MemoryStore, DEFAULT_PURGE_INTERVAL};
#[cfg(feature = "redis-store")]
pub use redis_store::{RedisSession, RedisStore};

/// Errors produced by session stores and propagators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The store has no live session with this id
    NotFound { id: String },
    /// The session has no value under this key
    KeyNotFound { key: String },
    /// The request carries no session id
    MissingId,
    /// The backing store failed (e.g. Redis unreachable)
    Backend { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NotFound { id } => write!(f, "session '{id}' not found"),
            SessionError::KeyNotFound { key } => write!(f, "session key '{key}' not found"),
            SessionError::MissingId => write!(f, "request carries no session id"),
            SessionError::Backend { reason } => write!(f, "session store error: {reason}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// A live session
pub trait Session: Send + Sync {
    fn id(&self) -> &str;

    /// # Errors
    ///
    /// [`SessionError::KeyNotFound`] if nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Value, SessionError>;

    /// # Errors
    ///
    /// Store-specific; the in-memory session never fails.
    fn set(&self, key: &str, value: Value) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Store-specific; the in-memory session never fails.
    fn delete(&self, key: &str) -> Result<(), SessionError>;
}

/// Shared handle to a session
pub type SharedSession = Arc<dyn Session>;

/// Backing storage for sessions
pub trait Store: Send + Sync {
    /// Create a fresh session under `id`, replacing any existing one
    ///
    /// # Errors
    ///
    /// Store-specific.
    fn generate(&self, id: &str) -> Result<SharedSession, SessionError>;

    /// Fetch a live session
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] if `id` is unknown or expired.
    fn get(&self, id: &str) -> Result<SharedSession, SessionError>;

    /// Extend a session's lifetime
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] if `id` is unknown or expired.
    fn refresh(&self, id: &str) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Store-specific; removing an unknown id is not an error.
    fn remove(&self, id: &str) -> Result<(), SessionError>;
}

/// Carries the session id between client and server
pub trait Propagator: Send + Sync {
    /// Attach `id` to the response
    ///
    /// # Errors
    ///
    /// Propagator-specific.
    fn inject(&self, id: &str, ctx: &mut Context) -> Result<(), SessionError>;

    /// Read the session id from the request
    ///
    /// # Errors
    ///
    /// [`SessionError::MissingId`] if the request carries none.
    fn extract(&self, ctx: &Context) -> Result<String, SessionError>;

    /// Tell the client to drop its session id
    ///
    /// # Errors
    ///
    /// Propagator-specific.
    fn remove(&self, ctx: &mut Context) -> Result<(), SessionError>;
}
