//! Message queue service

use crate::error::Result;
use async_trait::async_trait;
use conflux_types::{QueueName, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Observed queue attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDescription {
    pub tenant: TenantId,
    pub name: QueueName,
    pub arn: String,

    /// Role ARNs allowed to consume from the queue
    #[serde(default)]
    pub consumers: BTreeSet<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Tenant-scoped message queues
#[async_trait]
pub trait MessageQueueService: Send + Sync {
    async fn describe_queue(&self, queue_arn: &str) -> Result<Option<QueueDescription>>;

    /// Create a queue; creating an existing queue returns it unchanged
    async fn create_queue(&self, tenant: &TenantId, name: &QueueName) -> Result<QueueDescription>;

    /// Allow a role to consume from a queue; granting twice is a no-op
    async fn grant_consume(&self, queue_arn: &str, role_arn: &str) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
