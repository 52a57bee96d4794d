//! Error types for favs.
//!
//! Library crates use [`FavsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics; the protocol
//! server maps it onto JSON-RPC error objects.

use std::path::PathBuf;

/// Top-level error type for all favs operations.
#[derive(Debug, thiserror::Error)]
pub enum FavsError {
    /// No source or renderer is registered (or resolvable) under the name.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A source reports it cannot currently be read.
    #[error("source unavailable: {name}")]
    Unavailable { name: String },

    /// A configured, available source failed while reading.
    #[error("reading from {source_name}: {message}")]
    ReadFailure {
        source_name: String,
        message: String,
    },

    /// A source or renderer rejected its `configure` options.
    #[error("invalid configuration for {adapter}: {message}")]
    ConfigInvalid { adapter: String, message: String },

    /// The pipeline collected zero records before filtering.
    #[error("no bookmarks found")]
    EmptyResult,

    /// The requested renderer name is not registered.
    #[error("unknown output format: {name} (available: {available})")]
    InvalidFormat { name: String, available: String },

    /// A renderer failed to produce output.
    #[error("rendering {renderer}: {message}")]
    Render { renderer: String, message: String },

    /// Configuration file loading or parsing error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Source data could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FavsError>;

impl FavsError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    pub fn source_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "source",
            name: name.into(),
        }
    }

    pub fn renderer_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "renderer",
            name: name.into(),
        }
    }

    /// Wrap any error raised while reading `source_name`.
    pub fn read_failure(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::ReadFailure {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }

    pub fn config_invalid(adapter: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            adapter: adapter.into(),
            message: msg.into(),
        }
    }

    pub fn render(renderer: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Render {
            renderer: renderer.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FavsError::config("missing file");
        assert_eq!(err.to_string(), "config error: missing file");

        let err = FavsError::source_not_found("netscape");
        assert_eq!(err.to_string(), "source not found: netscape");

        let err = FavsError::read_failure("firefox", "database is locked");
        assert!(err.to_string().contains("database is locked"));
    }

    #[test]
    fn invalid_format_lists_available() {
        let err = FavsError::InvalidFormat {
            name: "csv".into(),
            available: "json, markdown".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown output format: csv (available: json, markdown)"
        );
    }
}
