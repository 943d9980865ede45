use super::OperationHooks;
use crate::catalog::{ApiAccessStore, ProcessorCatalog};
use crate::error::{Result, RuntimeError};
use crate::identity::{IdentityClaims, IdentityProvider};
use async_trait::async_trait;
use conflux_types::{ApiAccess, Processor, ProcessorName, TenantId, TenantPlan};
use dashmap::DashMap;

/// In-memory processor catalog
#[derive(Debug, Default)]
pub struct InMemoryProcessorCatalog {
    processors: DashMap<TenantId, Vec<Processor>>,
    plans: DashMap<TenantId, TenantPlan>,
    default_plan: TenantPlan,
    hooks: OperationHooks,
}

impl InMemoryProcessorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_plan(mut self, plan: TenantPlan) -> Self {
        self.default_plan = plan;
        self
    }

    /// Declare a processor, replacing any declaration with the same name
    pub fn upsert_processor(&self, processor: Processor) {
        let mut declared = self.processors.entry(processor.tenant.clone()).or_default();
        match declared.iter_mut().find(|p| p.name == processor.name) {
            Some(existing) => *existing = processor,
            None => declared.push(processor),
        }
    }

    pub fn set_plan(&self, tenant: TenantId, plan: TenantPlan) {
        self.plans.insert(tenant, plan);
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl ProcessorCatalog for InMemoryProcessorCatalog {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn list_processors(&self, tenant: &TenantId) -> Result<Vec<Processor>> {
        self.hooks.enter("list_processors")?;
        Ok(self
            .processors
            .get(tenant)
            .map(|declared| declared.clone())
            .unwrap_or_default())
    }

    async fn get_processor(
        &self,
        tenant: &TenantId,
        name: &ProcessorName,
    ) -> Result<Option<Processor>> {
        self.hooks.enter("get_processor")?;
        Ok(self
            .processors
            .get(tenant)
            .and_then(|declared| declared.iter().find(|p| &p.name == name).cloned()))
    }

    async fn tenant_plan(&self, tenant: &TenantId) -> Result<TenantPlan> {
        self.hooks.enter("tenant_plan")?;
        Ok(self
            .plans
            .get(tenant)
            .map(|plan| plan.clone())
            .unwrap_or_else(|| self.default_plan.clone()))
    }
}

/// In-memory API key table
#[derive(Debug, Default)]
pub struct InMemoryApiAccessStore {
    entries: DashMap<String, ApiAccess>,
    hooks: OperationHooks,
}

impl InMemoryApiAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, access: ApiAccess) {
        self.entries.insert(access.key.clone(), access);
    }

    pub fn revoke(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl ApiAccessStore for InMemoryApiAccessStore {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn get(&self, key: &str) -> Result<Option<ApiAccess>> {
        self.hooks.enter("get")?;
        Ok(self.entries.get(key).map(|e| e.clone()))
    }
}

/// Identity provider backed by a fixed token table
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    tokens: DashMap<String, IdentityClaims>,
    hooks: OperationHooks,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, token: impl Into<String>, claims: IdentityClaims) {
        self.tokens.insert(token.into(), claims);
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn verify(&self, token: &str) -> Result<IdentityClaims> {
        self.hooks.enter("verify")?;
        self.tokens
            .get(token)
            .map(|claims| claims.clone())
            .ok_or_else(|| RuntimeError::InvalidCredential("unknown token".to_string()))
    }
}
