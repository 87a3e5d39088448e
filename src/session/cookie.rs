use std::fmt;
use std::sync::Arc;

use super::{Propagator, SessionError};
use crate::context::{Context, Cookie};

/// Default name of the session cookie
pub const DEFAULT_COOKIE_NAME: &str = "sessid";

type CookieOption = Arc<dyn Fn(&mut Cookie) + Send + Sync>;

/// [`Propagator`] that carries the session id in a cookie
///
/// Cookies are `HttpOnly` with path `/` unless an option closure changes
/// them.
#[derive(Clone)]
pub struct CookiePropagator {
    name: String,
    options: Vec<CookieOption>,
}

impl fmt::Debug for CookiePropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookiePropagator")
            .field("name", &self.name)
            .field("options", &self.options.len())
            .finish()
    }
}

impl Default for CookiePropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl CookiePropagator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adjust every cookie this propagator sets (domain, max-age, secure...)
    #[must_use]
    pub fn with_option(mut self, option: impl Fn(&mut Cookie) + Send + Sync + 'static) -> Self {
        self.options.push(Arc::new(option));
        self
    }

    fn cookie(&self, value: &str) -> Cookie {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.path = Some("/".to_string());
        cookie.http_only = true;
        for option in &self.options {
            option(&mut cookie);
        }
        cookie
    }
}

impl Propagator for CookiePropagator {
    fn inject(&self, id: &str, ctx: &mut Context) -> Result<(), SessionError> {
        ctx.set_cookie(&self.cookie(id));
        Ok(())
    }

    fn extract(&self, ctx: &Context) -> Result<String, SessionError> {
        ctx.cookie(&self.name)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or(SessionError::MissingId)
    }

    fn remove(&self, ctx: &mut Context) -> Result<(), SessionError> {
        let mut cookie = self.cookie("");
        cookie.max_age = Some(-1);
        ctx.set_cookie(&cookie);
        Ok(())
    }
}
