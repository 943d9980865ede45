//! Idempotent role and inline-policy provisioning

use crate::error::RoleError;
use crate::policy::{execution_trust_policy, DEFAULT_EXECUTION_PRINCIPAL};
use conflux_convergence::{Classification, ConvergenceWaiter};
use conflux_runtime::{CreateRoleRequest, RoleAndPolicyStore};
use conflux_types::{IamRole, PolicyDocument, RoleName};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Creates execution roles and attaches their policies
pub struct RoleProvisioner {
    store: Arc<dyn RoleAndPolicyStore>,
    waiter: ConvergenceWaiter,
    execution_principal: String,
}

impl RoleProvisioner {
    pub fn new(store: Arc<dyn RoleAndPolicyStore>, waiter: ConvergenceWaiter) -> Self {
        Self {
            store,
            waiter,
            execution_principal: DEFAULT_EXECUTION_PRINCIPAL.to_string(),
        }
    }

    pub fn with_execution_principal(mut self, principal: impl Into<String>) -> Self {
        self.execution_principal = principal.into();
        self
    }

    /// Return the named role, creating it if it does not exist.
    ///
    /// The returned role is visible to subsequent reads. A role created
    /// concurrently elsewhere is adopted as long as its permission boundary
    /// is the requested one.
    #[instrument(skip(self, role_name, description), fields(role = %role_name))]
    pub async fn get_or_create_role(
        &self,
        role_name: &RoleName,
        permission_boundary: Option<&str>,
        description: &str,
    ) -> Result<IamRole, RoleError> {
        if let Some(existing) = self.store.get_role(role_name).await? {
            debug!("Role already exists");
            return check_boundary(existing, permission_boundary);
        }

        let request = CreateRoleRequest {
            name: role_name.clone(),
            trust_policy: execution_trust_policy(&self.execution_principal),
            permission_boundary_arn: permission_boundary.map(str::to_string),
            description: description.to_string(),
        };
        match self.store.create_role(request).await {
            Ok(role) => info!(arn = %role.arn, "Created execution role"),
            Err(err) if err.is_already_exists() => {
                info!("Role created concurrently, adopting it");
            }
            Err(err) => return Err(err.into()),
        }

        let store = &self.store;
        let role = self
            .waiter
            .wait(
                &format!("role {role_name}"),
                move || store.get_role(role_name),
                |observed: Option<IamRole>| match observed {
                    Some(role) => Classification::Success(role),
                    None => Classification::Retry,
                },
            )
            .await?;

        check_boundary(role, permission_boundary)
    }

    /// Make `document` the role's inline policy named `policy_name`.
    ///
    /// A no-op when the identical document is already attached; otherwise
    /// the document is put and this waits until reads return it.
    #[instrument(skip(self, role_name, document), fields(role = %role_name, policy = policy_name))]
    pub async fn ensure_policy_attached(
        &self,
        role_name: &RoleName,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<(), RoleError> {
        let current = self.store.get_role_policy(role_name, policy_name).await?;
        if current.as_ref() == Some(document) {
            debug!("Policy already attached");
            return Ok(());
        }

        self.store
            .put_role_policy(role_name, policy_name, document)
            .await?;
        info!(replaced = current.is_some(), "Put role policy");

        let store = &self.store;
        self.waiter
            .wait(
                &format!("policy {policy_name} on role {role_name}"),
                move || store.get_role_policy(role_name, policy_name),
                |observed: Option<PolicyDocument>| match observed {
                    Some(ref attached) if attached == document => Classification::Success(()),
                    _ => Classification::Retry,
                },
            )
            .await?;
        Ok(())
    }
}

fn check_boundary(role: IamRole, expected: Option<&str>) -> Result<IamRole, RoleError> {
    if role.permission_boundary_arn.as_deref() == expected {
        return Ok(role);
    }
    Err(RoleError::BoundaryMismatch {
        expected: expected.map(str::to_string),
        actual: role.permission_boundary_arn,
        role: role.name,
    })
}
