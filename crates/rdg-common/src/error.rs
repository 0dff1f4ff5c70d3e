// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RdgError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Named column not present in the scope.
    #[error("no property named '{name}' in {scope} scope")]
    PropertyNotFound { name: String, scope: String },

    /// Internal invariant breach.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    /// Version-to-version storage format incompatibility.
    #[error("storage format mismatch: {0}")]
    SchemaMismatch(String),

    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RdgError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RdgError::InvalidArgument(message.into())
    }

    pub fn property_not_found(name: impl Into<String>, scope: impl Into<String>) -> Self {
        RdgError::PropertyNotFound {
            name: name.into(),
            scope: scope.into(),
        }
    }

    pub fn assertion_failed(message: impl Into<String>) -> Self {
        RdgError::AssertionFailed(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        RdgError::Io {
            message: message.into(),
            source: None,
        }
    }

    /// Prefix the message of an `Io` error with additional context, leaving
    /// other variants untouched.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            RdgError::Io { message, source } => RdgError::Io {
                message: format!("{context}: {message}"),
                source,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for RdgError {
    fn from(err: std::io::Error) -> Self {
        RdgError::Io {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<object_store::Error> for RdgError {
    fn from(err: object_store::Error) -> Self {
        RdgError::Io {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for RdgError {
    fn from(err: serde_json::Error) -> Self {
        RdgError::Io {
            message: format!("json: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<parquet::errors::ParquetError> for RdgError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        RdgError::Io {
            message: format!("parquet: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<arrow_schema::ArrowError> for RdgError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        RdgError::Io {
            message: format!("arrow: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, RdgError>;
