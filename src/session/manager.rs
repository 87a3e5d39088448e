use std::sync::Arc;
use tracing::debug;
use ulid::Ulid;

use super::{Propagator, SessionError, SharedSession, Store};
use crate::context::Context;

const DEFAULT_CONTEXT_KEY: &str = "brrtweb.session";

/// Resolves sessions for requests
///
/// A resolved session is cached in the request's user values, so repeated
/// lookups within one request hit the store once.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
    propagator: Arc<dyn Propagator>,
    context_key: String,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, propagator: Arc<dyn Propagator>) -> Self {
        Self {
            store,
            propagator,
            context_key: DEFAULT_CONTEXT_KEY.to_string(),
        }
    }

    /// Session for the current request
    ///
    /// # Errors
    ///
    /// [`SessionError::MissingId`] when the request carries no id,
    /// [`SessionError::NotFound`] when the id is unknown or expired.
    pub fn get_session(&self, ctx: &mut Context) -> Result<SharedSession, SessionError> {
        if let Some(session) = ctx.user_value::<SharedSession>(&self.context_key) {
            return Ok(Arc::clone(session));
        }
        let id = self.propagator.extract(ctx)?;
        let session = self.store.get(&id)?;
        ctx.set_user_value(&self.context_key, Arc::clone(&session));
        Ok(session)
    }

    /// Start a new session and attach its id to the response
    ///
    /// # Errors
    ///
    /// Store or propagator failures.
    pub fn init_session(&self, ctx: &mut Context) -> Result<SharedSession, SessionError> {
        let id = Ulid::new().to_string();
        let session = self.store.generate(&id)?;
        self.propagator.inject(&id, ctx)?;
        ctx.set_user_value(&self.context_key, Arc::clone(&session));
        debug!(request_id = %ctx.request_id, session_id = %id, "Session created");
        Ok(session)
    }

    /// Extend the lifetime of the current session
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::get_session`].
    pub fn refresh_session(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let session = self.get_session(ctx)?;
        self.store.refresh(session.id())
    }

    /// End the current session in the store and on the client
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::get_session`].
    pub fn remove_session(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let session = self.get_session(ctx)?;
        self.store.remove(session.id())?;
        self.propagator.remove(ctx)?;
        ctx.remove_user_value(&self.context_key);
        debug!(request_id = %ctx.request_id, session_id = %session.id(), "Session removed");
        Ok(())
    }
}
