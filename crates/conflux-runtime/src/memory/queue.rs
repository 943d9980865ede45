use super::OperationHooks;
use crate::error::{Result, RuntimeError};
use crate::queue::{MessageQueueService, QueueDescription};
use async_trait::async_trait;
use conflux_types::{QueueName, SubstrateAccount, TenantId};
use dashmap::DashMap;
use std::collections::BTreeSet;

/// In-memory queue service keyed by queue ARN
#[derive(Debug, Default)]
pub struct InMemoryQueueService {
    account: SubstrateAccount,
    queues: DashMap<String, QueueDescription>,
    hooks: OperationHooks,
}

impl InMemoryQueueService {
    pub fn new(account: SubstrateAccount) -> Self {
        Self {
            account,
            queues: DashMap::new(),
            hooks: OperationHooks::new(),
        }
    }

    /// Role ARNs allowed to consume from a queue
    pub fn consumers(&self, queue_arn: &str) -> BTreeSet<String> {
        self.queues
            .get(queue_arn)
            .map(|q| q.consumers.clone())
            .unwrap_or_default()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl MessageQueueService for InMemoryQueueService {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn describe_queue(&self, queue_arn: &str) -> Result<Option<QueueDescription>> {
        self.hooks.enter("describe_queue")?;
        Ok(self.queues.get(queue_arn).map(|q| q.clone()))
    }

    async fn create_queue(&self, tenant: &TenantId, name: &QueueName) -> Result<QueueDescription> {
        self.hooks.enter("create_queue")?;
        let arn = self.account.queue_arn(tenant, name);
        let queue = self
            .queues
            .entry(arn.clone())
            .or_insert_with(|| QueueDescription {
                tenant: tenant.clone(),
                name: name.clone(),
                arn,
                consumers: BTreeSet::new(),
                created_at: chrono::Utc::now(),
            });
        Ok(queue.clone())
    }

    async fn grant_consume(&self, queue_arn: &str, role_arn: &str) -> Result<()> {
        self.hooks.enter("grant_consume")?;
        let mut queue = self
            .queues
            .get_mut(queue_arn)
            .ok_or_else(|| RuntimeError::not_found("queue", queue_arn))?;
        queue.consumers.insert(role_arn.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_is_idempotent_and_grants_accumulate() {
        let service = InMemoryQueueService::new(SubstrateAccount::default());
        let tenant = TenantId::new("acme");
        let first = service.create_queue(&tenant, &"raw".into()).await.unwrap();
        let second = service.create_queue(&tenant, &"raw".into()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.queue_count(), 1);

        service.grant_consume(&first.arn, "arn:role/a").await.unwrap();
        service.grant_consume(&first.arn, "arn:role/a").await.unwrap();
        assert_eq!(service.consumers(&first.arn).len(), 1);
    }

    #[tokio::test]
    async fn test_grant_on_missing_queue_fails() {
        let service = InMemoryQueueService::new(SubstrateAccount::default());
        let err = service.grant_consume("arn:missing", "arn:role/a").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
