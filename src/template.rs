//! Template rendering behind a small trait.
//!
//! The server holds at most one [`TemplateEngine`]; handlers reach it through
//! [`Context::render`](crate::Context::render). [`MiniJinjaEngine`] is the
//! bundled implementation.

use minijinja::{Environment, ErrorKind};
use std::fmt;
use std::path::Path;

/// Errors produced while rendering a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// No template is registered under this name
    NotFound { name: String },
    /// The template source failed to parse
    Syntax { name: String, reason: String },
    /// Rendering failed at runtime
    Render { name: String, reason: String },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::NotFound { name } => write!(f, "template '{name}' not found"),
            TemplateError::Syntax { name, reason } => {
                write!(f, "template '{name}' failed to parse: {reason}")
            }
            TemplateError::Render { name, reason } => {
                write!(f, "template '{name}' failed to render: {reason}")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Renders a named template with JSON data
pub trait TemplateEngine: Send + Sync {
    fn render(&self, name: &str, data: &serde_json::Value) -> Result<Vec<u8>, TemplateError>;
}

/// [`TemplateEngine`] backed by `minijinja`
///
/// Templates are added from strings, or loaded lazily from a directory.
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl fmt::Debug for MiniJinjaEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniJinjaEngine").finish_non_exhaustive()
    }
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniJinjaEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Load templates on demand from `dir`, by file name relative to it
    #[must_use]
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.as_ref()));
        Self { env }
    }

    /// Register a template from source
    ///
    /// # Errors
    ///
    /// [`TemplateError::Syntax`] if the source does not parse.
    pub fn add_template(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        self.env
            .add_template_owned(name.clone(), source.into())
            .map_err(|e| TemplateError::Syntax {
                name,
                reason: e.to_string(),
            })
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, name: &str, data: &serde_json::Value) -> Result<Vec<u8>, TemplateError> {
        let template = self.env.get_template(name).map_err(|e| match e.kind() {
            ErrorKind::TemplateNotFound => TemplateError::NotFound {
                name: name.to_string(),
            },
            _ => TemplateError::Syntax {
                name: name.to_string(),
                reason: e.to_string(),
            },
        })?;
        template
            .render(data)
            .map(String::into_bytes)
            .map_err(|e| TemplateError::Render {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}
