//! Error types shared by the enumeration engine and the collectors.

use std::fmt;
use std::io;
use std::panic::Location;

use thiserror::Error;

/// Error type for collection failures.
#[derive(Debug, Error)]
pub enum CollectError {
    /// I/O error reading provider files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Parse error in provider files.
    #[error("parse error: {0}")]
    Parse(String),

    /// The backing resource disappeared between discovery and refresh.
    #[error("{0} disappeared")]
    Gone(String),

    /// The operation has no meaning for this resource kind.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The provider exists but holds no usable data.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e.message)
    }
}

/// Error type for the pure parsers in [`crate::collector::parser`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parse error: {message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Failure raised by [`crate::entity::Instance::update`].
///
/// Carries the underlying [`CollectError`] and the source location it was
/// raised from. Conversions are `#[track_caller]`, so `?` inside an `update`
/// implementation records the location of the `?` itself.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct UpdateError {
    #[source]
    error: CollectError,
    location: &'static Location<'static>,
}

impl UpdateError {
    #[track_caller]
    pub fn new(error: impl Into<CollectError>) -> Self {
        Self {
            error: error.into(),
            location: Location::caller(),
        }
    }

    /// Human-readable description of the failure.
    pub fn what(&self) -> String {
        self.error.to_string()
    }

    /// Where the failure was raised, as `file:line:column`.
    pub fn location(&self) -> ErrorLocation {
        ErrorLocation(self.location)
    }

    pub fn error(&self) -> &CollectError {
        &self.error
    }

    pub fn into_inner(self) -> CollectError {
        self.error
    }
}

impl From<CollectError> for UpdateError {
    #[track_caller]
    fn from(error: CollectError) -> Self {
        Self::new(error)
    }
}

impl From<io::Error> for UpdateError {
    #[track_caller]
    fn from(error: io::Error) -> Self {
        Self::new(error)
    }
}

impl From<ParseError> for UpdateError {
    #[track_caller]
    fn from(error: ParseError) -> Self {
        Self::new(error)
    }
}

/// Display adapter for the origin of an [`UpdateError`].
#[derive(Debug, Clone, Copy)]
pub struct ErrorLocation(&'static Location<'static>);

impl ErrorLocation {
    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.0.file(), self.0.line(), self.0.column())
    }
}

/// Errors loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid log directive '{directive}': {reason}")]
    Directive { directive: String, reason: String },
}
