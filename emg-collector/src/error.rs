// Copyright (c) 2024 DDN. All rights reserved.
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file.

//! The closed error-code vocabulary shared by `emg-collector` and
//! `emg-analyzer`, and the parsing/ingest error type.

use std::{collections::BTreeMap, fmt, io, str};
use thiserror::Error;

/// Closed vocabulary of error codes. Never add a variant without updating
/// [`ErrorCode::recoverable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    FileNotFound,
    FilePermission,
    SchemaError,
    PathValidation,
    FileTooLarge,
    ParseError,
    ValidationError,
    Calculation,
    InsufficientData,
    ConfigValidation,
    Memory,
    DomainError,
    Cancelled,
    Unknown,
}

impl ErrorCode {
    /// Whether a caller may reasonably retry or otherwise recover from an
    /// error carrying this code. `FilePermission` and `Memory` are not
    /// recoverable; everything else defaults to recoverable.
    pub fn recoverable(self) -> bool {
        !matches!(self, ErrorCode::FilePermission | ErrorCode::Memory)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// String-keyed, printable-valued context attached to an error for
/// diagnosis. Never holds arbitrary `dyn Any`.
pub type ErrorContext = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("{0}")]
    Io(#[source] io::Error),
    #[error(transparent)]
    Utf8(#[from] str::Utf8Error),
    #[error("failed to parse {field}: {message}")]
    Parse {
        field: String,
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
    #[error("{message}")]
    Schema {
        message: String,
        context: ErrorContext,
    },
    #[error("{message}")]
    Validation {
        message: String,
        context: ErrorContext,
    },
    #[error("{message}")]
    ConfigValidation {
        message: String,
        context: ErrorContext,
    },
}

impl CollectorError {
    pub fn parse(field: impl Into<String>, message: impl Into<String>) -> Self {
        CollectorError::Parse {
            field: field.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        CollectorError::Schema {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CollectorError::Validation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        CollectorError::ConfigValidation {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attaches a printable piece of context, returning `self` for chaining.
    pub fn context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let value = value.to_string();
        match &mut self {
            CollectorError::Schema { context, .. }
            | CollectorError::Validation { context, .. }
            | CollectorError::ConfigValidation { context, .. } => {
                context.insert(key.into(), value);
            }
            _ => {}
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CollectorError::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            CollectorError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                ErrorCode::FilePermission
            }
            CollectorError::Io(_) => ErrorCode::Unknown,
            CollectorError::Utf8(_) => ErrorCode::ParseError,
            CollectorError::Parse { .. } => ErrorCode::ParseError,
            CollectorError::Schema { .. } => ErrorCode::SchemaError,
            CollectorError::Validation { .. } => ErrorCode::ValidationError,
            CollectorError::ConfigValidation { .. } => ErrorCode::ConfigValidation,
        }
    }

    pub fn recoverable(&self) -> bool {
        self.code().recoverable()
    }
}

impl From<io::Error> for CollectorError {
    fn from(e: io::Error) -> Self {
        CollectorError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_maps_to_code() {
        let err: CollectorError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.code(), ErrorCode::FileNotFound);
        assert!(err.recoverable());
    }

    #[test]
    fn permission_denied_is_not_recoverable() {
        let err: CollectorError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.code(), ErrorCode::FilePermission);
        assert!(!err.recoverable());
    }

    #[test]
    fn config_validation_maps_to_its_own_code() {
        let err = CollectorError::config_validation("precision out of range");
        assert_eq!(err.code(), ErrorCode::ConfigValidation);
        assert!(err.recoverable());
    }

    #[test]
    fn context_is_attached() {
        let err = CollectorError::schema("bad arity").context("channel", 3);
        match err {
            CollectorError::Schema { context, .. } => {
                assert_eq!(context.get("channel").map(String::as_str), Some("3"));
            }
            _ => panic!("expected schema error"),
        }
    }
}
