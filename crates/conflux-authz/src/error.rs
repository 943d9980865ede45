//! Authorizer errors

use conflux_runtime::RuntimeError;
use conflux_types::ErrorKind;
use thiserror::Error;

/// Authorizer errors
///
/// `Unauthorized` is answered with 401 at the edge; anything else is a
/// failure of the authorizer itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizerError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authorizer backend error: {0}")]
    Backend(String),
}

impl AuthorizerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Backend(_) => ErrorKind::Transient,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<RuntimeError> for AuthorizerError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::InvalidCredential(reason) => Self::Unauthorized(reason),
            other => Self::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credential_is_unauthorized() {
        let err = AuthorizerError::from(RuntimeError::InvalidCredential("expired".into()));
        assert!(err.is_unauthorized());
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn other_runtime_errors_are_backend_failures() {
        let err = AuthorizerError::from(RuntimeError::Unavailable("idp".into()));
        assert!(!err.is_unauthorized());
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
