//! Error types for the control plane

use conflux_authz::AuthorizerError;
use conflux_deployment::DeploymentError;
use conflux_types::ErrorKind;
use thiserror::Error;

/// Control plane error type
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Deployment subsystem error
    #[error("Deployment error: {0}")]
    Deployment(#[from] DeploymentError),

    /// Authorizer error
    #[error("Authorization error: {0}")]
    Authorizer(#[from] AuthorizerError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A required collaborator was not supplied to the builder
    #[error("Not configured: {0}")]
    NotConfigured(&'static str),

    /// Tracing could not be installed
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// A collaborator failed to release its resources
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Result type for control plane operations
pub type Result<T> = std::result::Result<T, ControlPlaneError>;

impl ControlPlaneError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Deployment(err) => err.kind(),
            Self::Authorizer(err) => err.kind(),
            Self::Config(_) | Self::NotConfigured(_) => ErrorKind::Validation,
            Self::Telemetry(_) | Self::Shutdown(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind() == ErrorKind::Unauthorized
    }
}
