//! Service Handles - Every outbound collaborator of the control plane
//!
//! Production wiring supplies substrate-backed implementations;
//! [`InMemorySubstrate`] supplies simulators for tests and local development.

use crate::config::ControlPlaneConfig;
use crate::error::{ControlPlaneError, Result};
use conflux_deployment::{DeploymentContext, DeploymentStateStore, InMemoryDeploymentStateStore};
use conflux_runtime::{
    ApiAccessStore, CodeArtifactStore, FunctionRuntime, IdentityProvider,
    InMemoryApiAccessStore, InMemoryArtifactStore, InMemoryFunctionRuntime,
    InMemoryProcessorCatalog, InMemoryQueueService, InMemoryRoleStore, MessageQueueService,
    ProcessorCatalog, RoleAndPolicyStore, StaticIdentityProvider,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles to the collaborators the control plane calls
#[derive(Clone)]
pub struct ServiceHandles {
    pub catalog: Arc<dyn ProcessorCatalog>,
    pub artifacts: Arc<dyn CodeArtifactStore>,
    pub functions: Arc<dyn FunctionRuntime>,
    pub queues: Arc<dyn MessageQueueService>,
    pub roles: Arc<dyn RoleAndPolicyStore>,
    pub records: Arc<dyn DeploymentStateStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub access: Arc<dyn ApiAccessStore>,
}

impl ServiceHandles {
    /// The subset used by deployments
    pub fn deployment_context(&self) -> DeploymentContext {
        DeploymentContext {
            catalog: self.catalog.clone(),
            artifacts: self.artifacts.clone(),
            functions: self.functions.clone(),
            queues: self.queues.clone(),
            roles: self.roles.clone(),
            records: self.records.clone(),
        }
    }

    /// Close every collaborator.
    ///
    /// All of them are closed even if one fails; the first failure is
    /// returned.
    pub async fn close(&self) -> Result<()> {
        let results = [
            ("catalog", self.catalog.close().await.map_err(|e| e.to_string())),
            ("artifacts", self.artifacts.close().await.map_err(|e| e.to_string())),
            ("functions", self.functions.close().await.map_err(|e| e.to_string())),
            ("queues", self.queues.close().await.map_err(|e| e.to_string())),
            ("roles", self.roles.close().await.map_err(|e| e.to_string())),
            ("records", self.records.close().await.map_err(|e| e.to_string())),
            ("identity", self.identity.close().await.map_err(|e| e.to_string())),
            ("access", self.access.close().await.map_err(|e| e.to_string())),
        ];

        let mut first_error = None;
        for (name, result) in results {
            match result {
                Ok(()) => debug!(collaborator = name, "Closed"),
                Err(reason) => {
                    warn!(collaborator = name, reason = %reason, "Close failed");
                    first_error.get_or_insert(ControlPlaneError::Shutdown(format!("{name}: {reason}")));
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Simulated substrate with handles to the concrete stores
#[derive(Debug, Clone)]
pub struct InMemorySubstrate {
    pub catalog: Arc<InMemoryProcessorCatalog>,
    pub artifacts: Arc<InMemoryArtifactStore>,
    pub functions: Arc<InMemoryFunctionRuntime>,
    pub queues: Arc<InMemoryQueueService>,
    pub roles: Arc<InMemoryRoleStore>,
    pub records: Arc<InMemoryDeploymentStateStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub access: Arc<InMemoryApiAccessStore>,
}

impl InMemorySubstrate {
    pub fn new(config: &ControlPlaneConfig) -> Self {
        let account = config.substrate.account();
        let simulation = config.simulation.clone();
        Self {
            catalog: Arc::new(
                InMemoryProcessorCatalog::new()
                    .with_default_plan(config.deployment.default_plan.clone()),
            ),
            artifacts: Arc::new(InMemoryArtifactStore::new()),
            functions: Arc::new(InMemoryFunctionRuntime::new(account.clone(), simulation.clone())),
            queues: Arc::new(InMemoryQueueService::new(account.clone())),
            roles: Arc::new(InMemoryRoleStore::new(account, simulation)),
            records: Arc::new(InMemoryDeploymentStateStore::new()),
            identity: Arc::new(StaticIdentityProvider::new()),
            access: Arc::new(InMemoryApiAccessStore::new()),
        }
    }

    pub fn handles(&self) -> ServiceHandles {
        ServiceHandles {
            catalog: self.catalog.clone(),
            artifacts: self.artifacts.clone(),
            functions: self.functions.clone(),
            queues: self.queues.clone(),
            roles: self.roles.clone(),
            records: self.records.clone(),
            identity: self.identity.clone(),
            access: self.access.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_runtime::RuntimeError;

    #[tokio::test]
    async fn test_close_in_memory_handles() {
        let substrate = InMemorySubstrate::new(&ControlPlaneConfig::default());
        assert!(substrate.handles().close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_reports_failure_after_closing_the_rest() {
        let substrate = InMemorySubstrate::new(&ControlPlaneConfig::default());
        substrate
            .queues
            .hooks()
            .fail_next("close", RuntimeError::Unavailable("draining".into()));

        let err = substrate.handles().close().await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::Shutdown(ref reason) if reason.starts_with("queues")));
    }
}
