//! Centralized error types for noticer using thiserror.
//!
//! Dispatch methods never return these to their caller: sink failures are
//! turned into notices of their own. Only configuration loading surfaces
//! errors directly.

use std::fmt;
use thiserror::Error;

/// Boxed error usable as a notice cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid repeat timeout for channel '{channel}': {message}")]
    InvalidTimeout { channel: String, message: String },
}

/// Code carried by an error, as raised by application code.
///
/// Numeric codes map onto notice codes. Symbolic codes cannot, and end up
/// annotated in the notice message instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Numeric(i64),
    Symbolic(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Numeric(code) => write!(f, "{}", code),
            ErrorCode::Symbolic(code) => f.write_str(code),
        }
    }
}

/// Generic application error with an optional code and cause.
///
/// Also used when a notice needs an error but none was attached.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct NoticeError {
    message: String,
    code: Option<ErrorCode>,
    #[source]
    source: Option<BoxError>,
}

impl NoticeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> Option<&ErrorCode> {
        self.code.as_ref()
    }
}

/// Errors returned by channel sinks.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to deliver notice: {0}")]
    DeliveryFailed(String),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Coded(#[from] NoticeError),
}

impl SinkError {
    /// Code carried by the error, if any.
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            SinkError::Coded(inner) => inner.code(),
            _ => None,
        }
    }
}

/// Extract the code carried by an arbitrary error, if it is one of ours.
pub fn error_code<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a ErrorCode> {
    if let Some(e) = err.downcast_ref::<NoticeError>() {
        return e.code();
    }
    if let Some(e) = err.downcast_ref::<SinkError>() {
        return e.code();
    }
    None
}
