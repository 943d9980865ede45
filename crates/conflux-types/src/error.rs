//! Identifier validation errors and error classification

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A tenant-supplied identifier failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },

    #[error("{kind} '{value}' is longer than {max} characters")]
    TooLong {
        kind: &'static str,
        value: String,
        max: usize,
    },

    #[error("{kind} '{value}' contains invalid character {found:?}")]
    InvalidCharacter {
        kind: &'static str,
        value: String,
        found: char,
    },

    #[error("{kind} '{value}' must start with an ASCII letter or digit")]
    InvalidStart { kind: &'static str, value: String },
}

/// Coarse classification shared by control-plane errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any external call
    Validation,
    NotFound,
    /// Another operation holds the pair; retry later
    Conflict,
    ConvergenceTimeout,
    /// Retryable substrate condition such as throttling
    Transient,
    /// Permission or provisioning failure; never retried
    Fatal,
    Unauthorized,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict | Self::ConvergenceTimeout | Self::Transient
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::ConvergenceTimeout => "convergence_timeout",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
            Self::Unauthorized => "unauthorized",
        };
        f.write_str(s)
    }
}
