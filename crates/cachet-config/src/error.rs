//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors (for CLI use)
    #[error("html template not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },

    #[error("output directory '{}' would overwrite {what}", path.display())]
    OutputDirConflict { path: PathBuf, what: &'static str },

    // Config parsing/loading errors
    #[error("config not found")]
    NotFound,

    #[error("invalid config value for '{field}'{}", render_hint(.hint))]
    InvalidValue { field: String, hint: Option<String> },

    #[error("invalid profile override: {message}")]
    InvalidProfileOverride { message: String },

    // Schema validation errors (no filesystem checks)
    #[error("no entry points specified")]
    NoEntries,

    #[error("{message}{}", render_hint(.hint))]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn schema(message: impl Into<String>, hint: impl Into<String>) -> Self {
        ConfigError::SchemaValidation {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }
}

fn render_hint(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" ({hint})"),
        None => String::new(),
    }
}
