//! Roles and inline role policies

use crate::error::Result;
use async_trait::async_trait;
use conflux_types::{IamRole, PolicyDocument, RoleName};

/// Parameters for creating an execution role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleRequest {
    pub name: RoleName,
    pub trust_policy: PolicyDocument,
    pub permission_boundary_arn: Option<String>,
    pub description: String,
}

/// Identity service holding roles and their inline policies
///
/// Reads are eventually consistent: a role or policy written a moment ago
/// may not be returned yet.
#[async_trait]
pub trait RoleAndPolicyStore: Send + Sync {
    async fn get_role(&self, name: &RoleName) -> Result<Option<IamRole>>;

    /// Create a role; fails with `AlreadyExists` if the name is taken
    async fn create_role(&self, request: CreateRoleRequest) -> Result<IamRole>;

    async fn get_role_policy(
        &self,
        role: &RoleName,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>>;

    /// Attach or replace an inline policy
    async fn put_role_policy(
        &self,
        role: &RoleName,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
