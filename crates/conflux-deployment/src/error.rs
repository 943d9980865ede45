//! Deployment error types

use crate::state::StateStoreError;
use conflux_convergence::{ConvergenceTimeout, WaitError};
use conflux_roles::RoleError;
use conflux_runtime::RuntimeError;
use conflux_topology::TopologyError;
use conflux_types::{DeploymentKey, ErrorKind, IdentifierError, OperationKind};
use thiserror::Error;

/// Deployment errors
#[derive(Debug, Clone, Error)]
pub enum DeploymentError {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Processor not declared: {0}")]
    ProcessorNotFound(DeploymentKey),

    #[error("{kind} operation by {holder} is in progress on {key}")]
    Conflict {
        key: DeploymentKey,
        kind: OperationKind,
        holder: String,
    },

    #[error("Lease on {0} was taken over by another operation")]
    LeaseLost(DeploymentKey),

    #[error(transparent)]
    Convergence(#[from] ConvergenceTimeout),

    /// A resource reached a state it will not leave on its own
    #[error("{resource} failed: {reason}")]
    ResourceFailed { resource: String, reason: String },

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error("Substrate error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),
}

impl DeploymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) | Self::Topology(_) => ErrorKind::Validation,
            Self::ProcessorNotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } | Self::LeaseLost(_) => ErrorKind::Conflict,
            Self::Convergence(_) => ErrorKind::ConvergenceTimeout,
            Self::ResourceFailed { .. } => ErrorKind::Fatal,
            Self::Role(RoleError::Timeout(_)) => ErrorKind::ConvergenceTimeout,
            Self::Role(err) if err.is_retryable() => ErrorKind::Transient,
            Self::Role(_) => ErrorKind::Fatal,
            Self::Runtime(err) if err.is_retryable() => ErrorKind::Transient,
            Self::Runtime(_) => ErrorKind::Fatal,
            Self::State(StateStoreError::RevisionMismatch { .. }) => ErrorKind::Conflict,
            Self::State(StateStoreError::Backend(_)) => ErrorKind::Transient,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Rejected before the lease was taken or any substrate call made
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }
}

impl From<WaitError<DeploymentError>> for DeploymentError {
    fn from(err: WaitError<DeploymentError>) -> Self {
        match err {
            WaitError::Timeout(timeout) => Self::Convergence(timeout),
            WaitError::Failed(err) | WaitError::Describe(err) => err,
        }
    }
}

/// Result type for deployment operations
pub type Result<T> = std::result::Result<T, DeploymentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_kinds() {
        let key = DeploymentKey::new("acme", "a");
        assert_eq!(DeploymentError::ProcessorNotFound(key.clone()).kind(), ErrorKind::NotFound);
        assert!(DeploymentError::Conflict {
            key: key.clone(),
            kind: OperationKind::Deploy,
            holder: "cp-1".into(),
        }
        .is_retryable());

        let timeout = ConvergenceTimeout {
            resource: "mapping".into(),
            waited: Duration::from_secs(300),
            attempts: 40,
            last_observed: "Creating".into(),
        };
        assert_eq!(
            DeploymentError::Role(RoleError::Timeout(timeout.clone())).kind(),
            ErrorKind::ConvergenceTimeout
        );
        assert!(DeploymentError::from(timeout).is_retryable());

        let denied = DeploymentError::Runtime(RuntimeError::AccessDenied("lambda".into()));
        assert_eq!(denied.kind(), ErrorKind::Fatal);
        assert!(!denied.is_retryable());
    }
}
