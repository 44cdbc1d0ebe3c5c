use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy shared by every core component. The server crate wraps
/// this in its own `AppError` to add HTTP-response rendering.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("module not found: {0}")]
    NotFound(String),

    #[error("failed to parse {path}: {reason}")]
    ParseError { path: String, reason: String },

    #[error("failed to resolve \"{specifier}\" from {importer}")]
    ResolveError { importer: String, specifier: String },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
