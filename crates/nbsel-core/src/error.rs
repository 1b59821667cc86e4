//! Error types for notebook selection and editing

use thiserror::Error;

/// Error type for notebook operations
#[derive(Error, Debug)]
pub enum NotebookError {
    /// I/O error when reading or writing a notebook file
    #[error("Failed to access notebook file: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or encoding error
    #[error("Failed to parse notebook JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid notebook structure or format
    #[error("Invalid notebook format: {0}")]
    InvalidFormat(String),

    /// Selector name not present in the registry
    #[error("No such selector: '{0}'")]
    NoSuchSelector(String),

    /// Selector arguments could not be bound
    #[error("Invalid arguments for selector '{selector}': {message}")]
    InvalidArgument {
        /// Selector (or operation) name
        selector: String,
        /// What went wrong
        message: String,
    },

    /// Regular expression failed to compile
    #[error("Invalid regular expression: {0}")]
    RegexError(#[from] regex::Error),

    /// Piped selector bytes could not be decoded (or encoded)
    #[error("Failed to decode selector: {0}")]
    SelectorCodec(String),

    /// Selector holds an in-process predicate that cannot cross a pipe
    #[error("Selector contains a custom predicate and cannot be serialized")]
    NotSerializable,

    /// Optional external tool is not installed
    #[error("Missing dependency: install '{package}' to use this operation")]
    MissingDependency {
        /// Package that provides the tool
        package: String,
    },

    /// External converter failed
    #[error("Export failed: {0}")]
    ExportError(String),
}

impl NotebookError {
    pub(crate) fn invalid_argument(selector: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            selector: selector.to_string(),
            message: message.into(),
        }
    }
}

impl From<bincode::Error> for NotebookError {
    fn from(err: bincode::Error) -> Self {
        Self::SelectorCodec(err.to_string())
    }
}

/// Result type alias for notebook operations
pub type Result<T> = std::result::Result<T, NotebookError>;
