//! Request-scoped context threaded through middleware and handlers.
//!
//! A [`Context`] is built by the server for every request. It carries the
//! parsed request, the routing result (matched route and path parameters),
//! and the response being assembled. Nothing is written to the socket until
//! the whole chain has returned, so middleware can inspect and rewrite the
//! response after calling the next stage.

use http::Method;
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::Serialize;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

use crate::router::ParamVec;
use crate::template::{TemplateEngine, TemplateError};

/// Maximum inline headers/cookies before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Errors returned by [`Context`] helpers
#[derive(Debug)]
pub enum ContextError {
    /// The requested path/query/form key is absent
    KeyNotFound {
        /// The missing key
        key: String,
    },
    /// `bind_json` was called on a request without a body
    EmptyBody,
    /// The body could not be decoded, or a value could not be encoded
    Json(serde_json::Error),
    /// `render` was called but no template engine is configured
    NoTemplateEngine,
    /// The template engine failed
    Template(TemplateError),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::KeyNotFound { key } => write!(f, "context: key '{key}' does not exist"),
            ContextError::EmptyBody => write!(f, "context: request body is empty"),
            ContextError::Json(e) => write!(f, "context: json error: {e}"),
            ContextError::NoTemplateEngine => write!(f, "context: no template engine configured"),
            ContextError::Template(e) => write!(f, "context: {e}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContextError::Json(e) => Some(e),
            ContextError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(e: serde_json::Error) -> Self {
        ContextError::Json(e)
    }
}

/// A `Set-Cookie` value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Seconds; a negative value deletes the cookie
    pub max_age: Option<i64>,
    pub http_only: bool,
    pub secure: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        match self.max_age {
            Some(age) if age < 0 => write!(f, "; Max-Age=0")?,
            Some(age) => write!(f, "; Max-Age={age}")?,
            None => {}
        }
        if self.http_only {
            write!(f, "; HttpOnly")?;
        }
        if self.secure {
            write!(f, "; Secure")?;
        }
        Ok(())
    }
}

/// Per-request state shared by every middleware and the handler
pub struct Context {
    /// Unique request ID for tracing and correlation
    pub request_id: Ulid,
    pub method: Method,
    /// Percent-decoded request path without the query string
    pub path: String,
    /// Raw query string (without `?`)
    pub raw_query: String,
    /// Request headers, names lower-cased
    pub headers: HeaderVec,
    /// Cookies parsed from the Cookie header
    pub cookies: HeaderVec,
    pub body: Vec<u8>,

    /// Route string of the matched node, empty until routing ran or when nothing matched
    pub route: String,
    /// Path parameters captured by the router
    pub path_params: ParamVec,

    /// Response status; `0` means unset and is flushed as `200`
    pub resp_status: u16,
    pub resp_body: Vec<u8>,
    pub resp_headers: HeaderVec,

    query_cache: Option<HashMap<String, Vec<String>>>,
    template_engine: Option<Arc<dyn TemplateEngine>>,
    user_values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("route", &self.route)
            .field("path_params", &self.path_params)
            .field("resp_status", &self.resp_status)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context for `method` and a request target that may carry a query string
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            request_id: Ulid::new(),
            method,
            path: percent_decode_str(path).decode_utf8_lossy().into_owned(),
            raw_query: raw_query.to_string(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: Vec::new(),
            route: String::new(),
            path_params: ParamVec::new(),
            resp_status: 0,
            resp_body: Vec::new(),
            resp_headers: HeaderVec::new(),
            query_cache: None,
            template_engine: None,
            user_values: HashMap::new(),
        }
    }

    /// Add a request header; `cookie` headers are also split into [`Context::cookies`]
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.push_header(name, value);
        self
    }

    /// Set the request body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub(crate) fn push_header(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if name == "cookie" {
            self.cookies.extend(parse_cookie_header(value));
        }
        self.headers.push((Arc::from(name), value.to_string()));
    }

    pub(crate) fn set_template_engine(&mut self, engine: Option<Arc<dyn TemplateEngine>>) {
        self.template_engine = engine;
    }

    /// Get a request header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of the Host header
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.header("host")
    }

    /// Get a request cookie by name
    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a captured path parameter
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if the matched route captured no such parameter.
    pub fn path_value(&self, key: &str) -> Result<&str, ContextError> {
        self.path_params
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| ContextError::KeyNotFound {
                key: key.to_string(),
            })
    }

    /// Get the first value of a query parameter
    ///
    /// The query string is decoded once per request and cached.
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if the query string has no such key.
    pub fn query_value(&mut self, key: &str) -> Result<&str, ContextError> {
        let raw_query = &self.raw_query;
        let cache = self
            .query_cache
            .get_or_insert_with(|| parse_urlencoded(raw_query.as_bytes()));
        cache
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .ok_or_else(|| ContextError::KeyNotFound {
                key: key.to_string(),
            })
    }

    /// Get a form value from a urlencoded body, falling back to the query string
    ///
    /// # Errors
    ///
    /// [`ContextError::KeyNotFound`] if neither the body nor the query has the key.
    pub fn form_value(&self, key: &str) -> Result<String, ContextError> {
        let is_form = self
            .header("content-type")
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
        let from_body = if is_form {
            url::form_urlencoded::parse(&self.body).find(|(k, _)| k == key)
        } else {
            None
        };
        from_body
            .or_else(|| url::form_urlencoded::parse(self.raw_query.as_bytes()).find(|(k, _)| k == key))
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| ContextError::KeyNotFound {
                key: key.to_string(),
            })
    }

    /// Decode the JSON request body
    ///
    /// # Errors
    ///
    /// [`ContextError::EmptyBody`] without a body, [`ContextError::Json`] if
    /// the body does not decode into `T`.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T, ContextError> {
        if self.body.is_empty() {
            return Err(ContextError::EmptyBody);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Set or replace a response header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.resp_headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.resp_headers.push((Arc::from(name), value.into()));
    }

    /// Get a response header by name (case-insensitive)
    #[must_use]
    pub fn resp_header(&self, name: &str) -> Option<&str> {
        self.resp_headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a `Set-Cookie` header
    pub fn set_cookie(&mut self, cookie: &Cookie) {
        self.resp_headers
            .push((Arc::from("Set-Cookie"), cookie.to_string()));
    }

    /// Encode `value` as the JSON response body
    ///
    /// # Errors
    ///
    /// [`ContextError::Json`] if `value` cannot be serialized; the response is left untouched.
    pub fn resp_json<T: Serialize + ?Sized>(
        &mut self,
        status: u16,
        value: &T,
    ) -> Result<(), ContextError> {
        let body = serde_json::to_vec(value)?;
        self.resp_status = status;
        self.resp_body = body;
        self.set_header("Content-Type", "application/json");
        Ok(())
    }

    /// Set a plain-text response
    pub fn resp_string(&mut self, status: u16, body: impl Into<String>) {
        self.resp_status = status;
        self.resp_body = body.into().into_bytes();
        self.set_header("Content-Type", "text/plain; charset=utf-8");
    }

    /// Render a named template into the response body
    ///
    /// Sets status 200 on success and 500 when the engine fails.
    ///
    /// # Errors
    ///
    /// [`ContextError::NoTemplateEngine`] when the server has no engine,
    /// [`ContextError::Template`] when rendering fails.
    pub fn render<T: Serialize + ?Sized>(
        &mut self,
        template: &str,
        data: &T,
    ) -> Result<(), ContextError> {
        let engine = self
            .template_engine
            .clone()
            .ok_or(ContextError::NoTemplateEngine)?;
        let data = serde_json::to_value(data)?;
        match engine.render(template, &data) {
            Ok(body) => {
                self.resp_status = 200;
                self.resp_body = body;
                self.set_header("Content-Type", "text/html; charset=utf-8");
                Ok(())
            }
            Err(e) => {
                self.resp_status = 500;
                Err(ContextError::Template(e))
            }
        }
    }

    /// Effective response status (unset responses are flushed as 200)
    #[must_use]
    pub fn status(&self) -> u16 {
        if self.resp_status == 0 {
            200
        } else {
            self.resp_status
        }
    }

    /// Store a request-scoped value for later middleware or handlers
    pub fn set_user_value<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.user_values.insert(key.to_string(), Box::new(value));
    }

    /// Fetch a request-scoped value stored with [`Context::set_user_value`]
    #[must_use]
    pub fn user_value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.user_values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Remove a request-scoped value
    pub fn remove_user_value(&mut self, key: &str) {
        self.user_values.remove(key);
    }
}

/// Split a Cookie header into name/value pairs
pub fn parse_cookie_header(value: &str) -> impl Iterator<Item = (Arc<str>, String)> + '_ {
    value.split(';').filter_map(|pair| {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        if name.is_empty() {
            return None;
        }
        let value = parts.next().unwrap_or("").trim().to_string();
        Some((Arc::from(name), value))
    })
}

fn parse_urlencoded(input: &[u8]) -> HashMap<String, Vec<String>> {
    let mut values: HashMap<String, Vec<String>> = HashMap::new();
    for (k, v) in url::form_urlencoded::parse(input) {
        values.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_new_splits_query() {
        let ctx = Context::new(Method::GET, "/users?limit=10&offset=20");
        assert_eq!(ctx.path, "/users");
        assert_eq!(ctx.raw_query, "limit=10&offset=20");
        assert_eq!(ctx.status(), 200);
    }

    #[test]
    fn test_new_decodes_path_not_query() {
        let ctx = Context::new(Method::GET, "/user/a%20b/caf%C3%A9?q=a%20b");
        assert_eq!(ctx.path, "/user/a b/café");
        assert_eq!(ctx.raw_query, "q=a%20b");

        // invalid escapes and bad utf-8 never fail the request
        let ctx = Context::new(Method::GET, "/x/%zz/%FF");
        assert_eq!(ctx.path, "/x/%zz/\u{FFFD}");
    }

    #[test]
    fn test_query_value_first_wins() {
        let mut ctx = Context::new(Method::GET, "/search?q=rust&q=go&name=a%20b");
        assert_eq!(ctx.query_value("q").unwrap(), "rust");
        assert_eq!(ctx.query_value("name").unwrap(), "a b");
        assert!(matches!(
            ctx.query_value("missing"),
            Err(ContextError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn test_form_value_prefers_body() {
        let ctx = Context::new(Method::POST, "/login?user=query&next=/home")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("user=body&pass=secret");
        assert_eq!(ctx.form_value("user").unwrap(), "body");
        assert_eq!(ctx.form_value("next").unwrap(), "/home");
        assert!(ctx.form_value("nope").is_err());
    }

    #[test]
    fn test_cookies_are_parsed_from_header() {
        let ctx = Context::new(Method::GET, "/").with_header("Cookie", "sessid=abc; theme=dark");
        assert_eq!(ctx.cookie("sessid"), Some("abc"));
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.header("COOKIE"), Some("sessid=abc; theme=dark"));
    }

    #[derive(Debug, Deserialize, Serialize, PartialEq)]
    struct User {
        name: String,
        age: u32,
    }

    #[test]
    fn test_bind_and_resp_json() {
        let ctx = Context::new(Method::POST, "/user").with_body(r#"{"name":"tom","age":18}"#);
        let user: User = ctx.bind_json().unwrap();
        assert_eq!(
            user,
            User {
                name: "tom".into(),
                age: 18
            }
        );

        let empty = Context::new(Method::POST, "/user");
        assert!(matches!(
            empty.bind_json::<User>(),
            Err(ContextError::EmptyBody)
        ));

        let mut ctx = Context::new(Method::GET, "/user");
        ctx.resp_json(201, &user).unwrap();
        assert_eq!(ctx.status(), 201);
        assert_eq!(ctx.resp_header("content-type"), Some("application/json"));
        assert_eq!(ctx.resp_body, br#"{"name":"tom","age":18}"#);
    }

    #[test]
    fn test_set_cookie_appends_headers() {
        let mut ctx = Context::new(Method::GET, "/");
        ctx.set_cookie(&Cookie::new("sky", "blue"));
        let mut glass = Cookie::new("glass", "green");
        glass.path = Some("/".into());
        glass.http_only = true;
        ctx.set_cookie(&glass);

        let cookies: Vec<&str> = ctx
            .resp_headers
            .iter()
            .filter(|(k, _)| k.as_ref() == "Set-Cookie")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(cookies, vec!["sky=blue", "glass=green; Path=/; HttpOnly"]);
    }

    #[test]
    fn test_user_values_are_typed() {
        let mut ctx = Context::new(Method::GET, "/");
        ctx.set_user_value("count", 3usize);
        assert_eq!(ctx.user_value::<usize>("count"), Some(&3));
        assert!(ctx.user_value::<String>("count").is_none());
        ctx.remove_user_value("count");
        assert!(ctx.user_value::<usize>("count").is_none());
    }

    #[test]
    fn test_render_without_engine() {
        let mut ctx = Context::new(Method::GET, "/");
        assert!(matches!(
            ctx.render("index.html", &serde_json::json!({})),
            Err(ContextError::NoTemplateEngine)
        ));
    }
}
