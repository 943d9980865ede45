//! Deployment Context - Collaborators used by the controller
//!
//! Every substrate call made by a deployment goes through one of these
//! handles. They are constructed by the caller and passed in; the
//! controller never creates its own.

use crate::state::DeploymentStateStore;
use conflux_runtime::{
    CodeArtifactStore, FunctionRuntime, MessageQueueService, ProcessorCatalog, RoleAndPolicyStore,
};
use std::sync::Arc;

/// Handles to the outbound collaborators of a deployment
#[derive(Clone)]
pub struct DeploymentContext {
    /// Declared processors and tenant plans
    pub catalog: Arc<dyn ProcessorCatalog>,
    /// Compiled processor code
    pub artifacts: Arc<dyn CodeArtifactStore>,
    /// Functions, versions, aliases and mappings
    pub functions: Arc<dyn FunctionRuntime>,
    /// Tenant queues
    pub queues: Arc<dyn MessageQueueService>,
    /// Execution roles and policies
    pub roles: Arc<dyn RoleAndPolicyStore>,
    /// Deployment records
    pub records: Arc<dyn DeploymentStateStore>,
}
