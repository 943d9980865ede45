//! Builder for [`ControlPlane`]

use crate::config::ControlPlaneConfig;
use crate::control_plane::ControlPlane;
use crate::error::{ControlPlaneError, Result};
use crate::handles::{InMemorySubstrate, ServiceHandles};
use conflux_authz::{AuthorizationPolicyGenerator, JwtIdentityProvider};
use conflux_deployment::DeploymentController;
use conflux_runtime::IdentityProvider;
use std::sync::Arc;
use tracing::info;

/// Assembles a [`ControlPlane`] from configuration and collaborators
///
/// When the authorizer section configures JWT settings, bearer tokens are
/// verified with them instead of the identity provider in the handles.
#[derive(Default)]
pub struct ControlPlaneBuilder {
    config: ControlPlaneConfig,
    handles: Option<ServiceHandles>,
    identity: Option<Arc<dyn IdentityProvider>>,
}

impl ControlPlaneBuilder {
    pub fn new(config: ControlPlaneConfig) -> Self {
        Self {
            config,
            handles: None,
            identity: None,
        }
    }

    pub fn with_handles(mut self, handles: ServiceHandles) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Use an in-memory substrate built from this builder's configuration
    pub fn with_in_memory_substrate(self) -> (Self, InMemorySubstrate) {
        let substrate = InMemorySubstrate::new(&self.config);
        let builder = self.with_handles(substrate.handles());
        (builder, substrate)
    }

    /// Verify bearer tokens with `identity`, overriding every other source
    pub fn with_identity_provider(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.config.deployment.holder = Some(holder.into());
        self
    }

    pub fn build(self) -> Result<ControlPlane> {
        self.config.validate()?;
        let mut handles = self
            .handles
            .ok_or(ControlPlaneError::NotConfigured("service handles"))?;

        if let Some(identity) = self.identity {
            handles.identity = identity;
        } else if let Some(jwt) = &self.config.authorizer.jwt {
            handles.identity = Arc::new(JwtIdentityProvider::from_settings(jwt)?);
        }

        let controller_config = self.config.controller_config();
        info!(
            holder = %controller_config.holder,
            region = %controller_config.account.region,
            alias = %controller_config.alias_name,
            "Control plane configured"
        );

        let controller = DeploymentController::new(handles.deployment_context(), controller_config);
        let authorizer = AuthorizationPolicyGenerator::new(
            handles.identity.clone(),
            handles.access.clone(),
            self.config.authorizer.clone(),
        );

        Ok(ControlPlane::new(self.config, handles, controller, authorizer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_authz::{JwtAlgorithm, JwtSettings};

    #[test]
    fn test_build_requires_handles() {
        let result = ControlPlaneBuilder::new(ControlPlaneConfig::default()).build();
        assert!(matches!(result, Err(ControlPlaneError::NotConfigured(_))));
    }

    #[test]
    fn test_holder_reaches_the_controller_config() {
        let (builder, _substrate) = ControlPlaneBuilder::new(ControlPlaneConfig::development())
            .with_holder("cp-a")
            .with_in_memory_substrate();
        let plane = builder.build().unwrap();
        assert_eq!(plane.config().deployment.holder.as_deref(), Some("cp-a"));
    }

    #[test]
    fn test_unusable_waiter_fails_the_build() {
        let mut config = ControlPlaneConfig::development();
        config.waiter.multiplier = f64::NAN;

        let (builder, _substrate) = ControlPlaneBuilder::new(config).with_in_memory_substrate();
        let err = builder.build().err().unwrap();
        assert!(matches!(err, ControlPlaneError::Config(_)));
    }

    #[test]
    fn test_invalid_jwt_settings_fail_the_build() {
        let mut config = ControlPlaneConfig::development();
        config.authorizer.jwt = Some(JwtSettings {
            algorithm: JwtAlgorithm::Hs256,
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: Vec::new(),
            leeway_secs: 60,
        });

        let (builder, _substrate) = ControlPlaneBuilder::new(config).with_in_memory_substrate();
        let err = builder.build().err().unwrap();
        assert!(matches!(err, ControlPlaneError::Authorizer(_)));
    }
}
