//! Main ControlPlane implementation
//!
//! The ControlPlane is the single entry point for the management API and the
//! data-plane edge. Deployment operations go to the
//! [`DeploymentController`]; request authorization goes to the
//! [`AuthorizationPolicyGenerator`] and never touches deployment state.

use crate::config::ControlPlaneConfig;
use crate::error::Result;
use crate::handles::ServiceHandles;
use conflux_authz::{AccessPolicy, AuthorizationPolicyGenerator};
use conflux_deployment::{DeploymentController, DeploymentStatus};
use conflux_types::{
    CodeArtifactRef, DeploymentEventEnvelope, FunctionDeployment, ProcessorName, TenantId,
};
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Unified control plane for Conflux operations
pub struct ControlPlane {
    config: ControlPlaneConfig,
    handles: ServiceHandles,
    controller: DeploymentController,
    authorizer: AuthorizationPolicyGenerator,
}

impl ControlPlane {
    pub(crate) fn new(
        config: ControlPlaneConfig,
        handles: ServiceHandles,
        controller: DeploymentController,
        authorizer: AuthorizationPolicyGenerator,
    ) -> Self {
        Self {
            config,
            handles,
            controller,
            authorizer,
        }
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    pub fn handles(&self) -> &ServiceHandles {
        &self.handles
    }

    /// Subscribe to deployment lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEventEnvelope> {
        self.controller.subscribe()
    }

    // ========== Deployment Operations ==========

    /// Deploy `artifact` as the live code of a processor
    #[instrument(skip_all, fields(tenant = %tenant, processor = %processor))]
    pub async fn deploy(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
        artifact: &CodeArtifactRef,
    ) -> Result<FunctionDeployment> {
        let record = self.controller.deploy(tenant, processor, artifact).await?;
        info!(
            version = record.active_version.as_deref().unwrap_or("-"),
            mappings = record.mappings.len(),
            "Processor deployed"
        );
        Ok(record)
    }

    /// Remove a processor's function and mappings
    #[instrument(skip_all, fields(tenant = %tenant, processor = %processor))]
    pub async fn teardown(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
    ) -> Result<FunctionDeployment> {
        let record = self.controller.teardown(tenant, processor).await?;
        info!(state = %record.state, "Processor torn down");
        Ok(record)
    }

    pub async fn get_deployment_status(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
    ) -> Result<DeploymentStatus> {
        Ok(self.controller.get_deployment_status(tenant, processor).await?)
    }

    pub async fn list_deployments(&self, tenant: &TenantId) -> Result<Vec<FunctionDeployment>> {
        Ok(self.controller.list_deployments(tenant).await?)
    }

    // ========== Request Authorization ==========

    /// Access policy for a raw request credential
    pub async fn authorize(&self, raw_credential: &str) -> Result<AccessPolicy> {
        Ok(self.authorizer.authorize(raw_credential).await?)
    }

    /// Close every collaborator
    pub async fn shutdown(&self) -> Result<()> {
        info!("Control plane shutting down");
        self.handles.close().await
    }
}
