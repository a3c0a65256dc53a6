//! Error types shared by the Kconfig loader, the database builder and the
//! documentation-side glue.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a Kconfig tree.
#[derive(Error, Debug)]
pub enum KconfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{filename}:{linenr}: {message}")]
    Syntax {
        filename: String,
        linenr: usize,
        message: String,
    },

    #[error("{filename}:{linenr}: '{pattern}' does not exist")]
    SourceNotFound {
        filename: String,
        linenr: usize,
        pattern: String,
    },

    #[error("{filename}:{linenr}: recursive 'source' of '{target}'")]
    RecursiveSource {
        filename: String,
        linenr: usize,
        target: String,
    },

    #[error("invalid source pattern '{0}': {1}")]
    Pattern(String, String),
}

impl KconfigError {
    pub(crate) fn syntax(filename: &str, linenr: usize, message: impl Into<String>) -> Self {
        KconfigError::Syntax {
            filename: filename.to_string(),
            linenr,
            message: message.into(),
        }
    }
}

/// Errors surfaced to whoever runs the documentation build.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Misuse of the extension by the documentation project
    /// (bad directive placement, missing database, ...).
    #[error("{0}")]
    ExtensionError(String),

    #[error("Kconfig error: {0}")]
    Kconfig(#[from] KconfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}
