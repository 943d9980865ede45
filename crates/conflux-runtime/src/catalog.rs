//! Tenant catalogs: declared processors, plans and API credentials

use crate::error::Result;
use async_trait::async_trait;
use conflux_types::{ApiAccess, Processor, ProcessorName, TenantId, TenantPlan};

/// Source of truth for what tenants have declared
#[async_trait]
pub trait ProcessorCatalog: Send + Sync {
    /// All processors of a tenant, in declaration order
    async fn list_processors(&self, tenant: &TenantId) -> Result<Vec<Processor>>;

    async fn get_processor(
        &self,
        tenant: &TenantId,
        name: &ProcessorName,
    ) -> Result<Option<Processor>>;

    /// The tenant's plan; tenants without one get the default plan
    async fn tenant_plan(&self, tenant: &TenantId) -> Result<TenantPlan>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Platform-issued API keys
#[async_trait]
pub trait ApiAccessStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ApiAccess>>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
