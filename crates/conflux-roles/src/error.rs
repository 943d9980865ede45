//! Role provisioning errors

use conflux_convergence::{ConvergenceTimeout, WaitError};
use conflux_runtime::RuntimeError;
use conflux_types::RoleName;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    /// The role exists with a different boundary; it is never changed in place
    #[error("role {role} has permission boundary {actual:?}, expected {expected:?}")]
    BoundaryMismatch {
        role: RoleName,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error(transparent)]
    Timeout(#[from] ConvergenceTimeout),

    #[error("identity service error: {0}")]
    Store(#[from] RuntimeError),
}

impl RoleError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BoundaryMismatch { .. } => false,
            Self::Timeout(_) => true,
            Self::Store(err) => err.is_retryable(),
        }
    }
}

impl From<WaitError<RuntimeError>> for RoleError {
    fn from(err: WaitError<RuntimeError>) -> Self {
        match err {
            WaitError::Timeout(timeout) => Self::Timeout(timeout),
            WaitError::Failed(err) | WaitError::Describe(err) => Self::Store(err),
        }
    }
}
