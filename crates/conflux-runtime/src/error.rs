//! Substrate error types

use thiserror::Error;

/// Errors reported by outbound collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The resource is mid-transition and cannot accept the change yet
    #[error("Resource conflict: {0}")]
    ResourceConflict(String),

    #[error("Throttled: {0}")]
    Throttled(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Transient conditions a caller may retry; everything else is fatal
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResourceConflict(_) | Self::Throttled(_) | Self::Unavailable(_)
        )
    }
}

/// Result type for collaborator calls
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_failures_are_fatal() {
        assert!(!RuntimeError::AccessDenied("iam:CreateRole".into()).is_retryable());
        assert!(!RuntimeError::not_found("role", "x").is_retryable());
        assert!(RuntimeError::Throttled("rate".into()).is_retryable());
    }

    #[test]
    fn test_display_names_the_resource() {
        let err = RuntimeError::already_exists("event source mapping", "m-1");
        assert_eq!(err.to_string(), "event source mapping already exists: m-1");
    }
}
