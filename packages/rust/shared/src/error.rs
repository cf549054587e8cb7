//! Error types for htmlcmd.
//!
//! Library crates use [`HtmlcmdError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Only [`HtmlcmdError::InvalidInput`] and [`HtmlcmdError::Fetch`] end a
//! conversion request. Parse problems are never errors (the parser degrades
//! instead), and plugin errors are caught by the plugin pipeline.

use std::path::PathBuf;

/// Top-level error type for all htmlcmd operations.
#[derive(Debug, thiserror::Error)]
pub enum HtmlcmdError {
    /// Caller input rejected before any work was done (e.g. a malformed URL).
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Network/HTTP error while fetching a page: unreachable host, timeout,
    /// or a non-success status.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A plugin failed while processing a content model.
    #[error("plugin '{name}' failed: {message}")]
    Plugin { name: String, message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Encoding a well-formed value failed. Indicates a broken internal invariant.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HtmlcmdError>;

impl HtmlcmdError {
    /// Create an invalid-input error from any displayable message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a plugin error attributed to the named plugin.
    pub fn plugin(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Plugin {
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error ends the conversion request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidInput { .. } | Self::Fetch(_))
    }
}
