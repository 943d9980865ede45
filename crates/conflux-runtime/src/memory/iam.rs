use super::{OperationHooks, SimulationConfig};
use crate::error::{Result, RuntimeError};
use crate::iam::{CreateRoleRequest, RoleAndPolicyStore};
use async_trait::async_trait;
use conflux_types::{IamRole, PolicyDocument, RoleName, SubstrateAccount};
use dashmap::DashMap;

#[derive(Debug)]
struct Lagged<T> {
    value: T,
    reads_left: u32,
}

#[derive(Debug, Default)]
struct PolicySlot {
    current: Option<PolicyDocument>,
    pending: Option<Lagged<PolicyDocument>>,
}

impl PolicySlot {
    fn observe(&mut self) -> Option<PolicyDocument> {
        if let Some(pending) = self.pending.as_mut() {
            if pending.reads_left > 0 {
                pending.reads_left -= 1;
            } else if let Some(pending) = self.pending.take() {
                self.current = Some(pending.value);
            }
        }
        self.current.clone()
    }
}

/// In-memory identity service with read-after-write lag
#[derive(Debug)]
pub struct InMemoryRoleStore {
    account: SubstrateAccount,
    settings: SimulationConfig,
    roles: DashMap<RoleName, Lagged<IamRole>>,
    policies: DashMap<(RoleName, String), PolicySlot>,
    hooks: OperationHooks,
}

impl InMemoryRoleStore {
    pub fn new(account: SubstrateAccount, settings: SimulationConfig) -> Self {
        Self {
            account,
            settings,
            roles: DashMap::new(),
            policies: DashMap::new(),
            hooks: OperationHooks::new(),
        }
    }

    /// Seed a role that is already visible
    pub fn insert_role(&self, role: IamRole) {
        self.roles.insert(
            role.name.clone(),
            Lagged {
                value: role,
                reads_left: 0,
            },
        );
    }

    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl RoleAndPolicyStore for InMemoryRoleStore {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn get_role(&self, name: &RoleName) -> Result<Option<IamRole>> {
        self.hooks.enter("get_role")?;
        let Some(mut entry) = self.roles.get_mut(name) else {
            return Ok(None);
        };
        if entry.reads_left > 0 {
            entry.reads_left -= 1;
            return Ok(None);
        }
        Ok(Some(entry.value.clone()))
    }

    async fn create_role(&self, request: CreateRoleRequest) -> Result<IamRole> {
        self.hooks.enter("create_role")?;
        let role = IamRole {
            arn: self.account.role_arn(&request.name),
            name: request.name,
            permission_boundary_arn: request.permission_boundary_arn,
            trust_policy: request.trust_policy,
            description: request.description,
            created_at: chrono::Utc::now(),
        };

        match self.roles.entry(role.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RuntimeError::already_exists("role", role.name.as_str()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Lagged {
                    value: role.clone(),
                    reads_left: self.settings.visibility_reads,
                });
                Ok(role)
            }
        }
    }

    async fn get_role_policy(
        &self,
        role: &RoleName,
        policy_name: &str,
    ) -> Result<Option<PolicyDocument>> {
        self.hooks.enter("get_role_policy")?;
        Ok(self
            .policies
            .get_mut(&(role.clone(), policy_name.to_string()))
            .and_then(|mut slot| slot.observe()))
    }

    async fn put_role_policy(
        &self,
        role: &RoleName,
        policy_name: &str,
        document: &PolicyDocument,
    ) -> Result<()> {
        self.hooks.enter("put_role_policy")?;
        if !self.roles.contains_key(role) {
            return Err(RuntimeError::not_found("role", role.as_str()));
        }

        let mut slot = self
            .policies
            .entry((role.clone(), policy_name.to_string()))
            .or_default();
        if self.settings.visibility_reads == 0 {
            slot.current = Some(document.clone());
            slot.pending = None;
        } else {
            slot.pending = Some(Lagged {
                value: document.clone(),
                reads_left: self.settings.visibility_reads,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_types::PolicyStatement;

    fn store(visibility_reads: u32) -> InMemoryRoleStore {
        InMemoryRoleStore::new(
            SubstrateAccount::default(),
            SimulationConfig {
                visibility_reads,
                ..SimulationConfig::default()
            },
        )
    }

    fn request(name: &str) -> CreateRoleRequest {
        CreateRoleRequest {
            name: RoleName::new(name),
            trust_policy: PolicyDocument::default(),
            permission_boundary_arn: None,
            description: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_role_becomes_visible_after_lagging_reads() {
        let store = store(2);
        let name = RoleName::new("cfx-acme-a-exec");
        store.create_role(request(name.as_str())).await.unwrap();

        assert!(store.get_role(&name).await.unwrap().is_none());
        assert!(store.get_role(&name).await.unwrap().is_none());
        assert!(store.get_role(&name).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_create_fails_even_while_invisible() {
        let store = store(5);
        store.create_role(request("r")).await.unwrap();
        let err = store.create_role(request("r")).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_replaced_policy_shows_old_document_until_visible() {
        let store = store(1);
        let role = RoleName::new("r");
        store.insert_role(IamRole {
            name: role.clone(),
            arn: "arn:role/r".to_string(),
            permission_boundary_arn: None,
            trust_policy: PolicyDocument::default(),
            description: String::new(),
            created_at: chrono::Utc::now(),
        });

        let v1 = PolicyDocument::new(vec![PolicyStatement::allow(["sqs:SendMessage"], ["arn:q1"])]);
        let v2 = PolicyDocument::new(vec![PolicyStatement::allow(["sqs:SendMessage"], ["arn:q2"])]);

        store.put_role_policy(&role, "access", &v1).await.unwrap();
        assert_eq!(store.get_role_policy(&role, "access").await.unwrap(), None);
        assert_eq!(store.get_role_policy(&role, "access").await.unwrap(), Some(v1.clone()));

        store.put_role_policy(&role, "access", &v2).await.unwrap();
        assert_eq!(store.get_role_policy(&role, "access").await.unwrap(), Some(v1));
        assert_eq!(store.get_role_policy(&role, "access").await.unwrap(), Some(v2));
    }

    #[tokio::test]
    async fn test_policy_on_missing_role_fails() {
        let store = store(0);
        let err = store
            .put_role_policy(&RoleName::new("ghost"), "access", &PolicyDocument::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
