//! Persisted deployment records
//!
//! Records are the only place where operations on one (tenant, processor)
//! pair are serialized. Every write is a compare-and-set on the record's
//! revision, so two control-plane instances can never both believe they
//! hold the lease.

use async_trait::async_trait;
use conflux_types::{DeploymentKey, FunctionDeployment, TenantId};
use dashmap::DashMap;
use thiserror::Error;

/// State store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateStoreError {
    #[error("Revision mismatch on {key}: expected {expected}, found {actual}")]
    RevisionMismatch {
        key: DeploymentKey,
        expected: u64,
        actual: u64,
    },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Storage for deployment records
#[async_trait]
pub trait DeploymentStateStore: Send + Sync {
    async fn get(&self, key: &DeploymentKey) -> Result<Option<FunctionDeployment>, StateStoreError>;

    /// Store `record` if the stored revision equals `expected_revision`
    /// (0 when no record exists). Returns the stored record, whose revision
    /// is `expected_revision + 1`.
    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        record: FunctionDeployment,
    ) -> Result<FunctionDeployment, StateStoreError>;

    async fn list(&self, tenant: &TenantId) -> Result<Vec<FunctionDeployment>, StateStoreError>;

    async fn close(&self) -> Result<(), StateStoreError> {
        Ok(())
    }
}

/// In-memory state store
#[derive(Debug, Default)]
pub struct InMemoryDeploymentStateStore {
    records: DashMap<DeploymentKey, FunctionDeployment>,
}

impl InMemoryDeploymentStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeploymentStateStore for InMemoryDeploymentStateStore {
    async fn get(&self, key: &DeploymentKey) -> Result<Option<FunctionDeployment>, StateStoreError> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        mut record: FunctionDeployment,
    ) -> Result<FunctionDeployment, StateStoreError> {
        use dashmap::mapref::entry::Entry;

        let key = record.key.clone();
        record.revision = expected_revision + 1;
        record.updated_at = chrono::Utc::now();

        match self.records.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let actual = entry.get().revision;
                if actual != expected_revision {
                    return Err(StateStoreError::RevisionMismatch {
                        key,
                        expected: expected_revision,
                        actual,
                    });
                }
                entry.insert(record.clone());
            }
            Entry::Vacant(entry) => {
                if expected_revision != 0 {
                    return Err(StateStoreError::RevisionMismatch {
                        key,
                        expected: expected_revision,
                        actual: 0,
                    });
                }
                entry.insert(record.clone());
            }
        }
        Ok(record)
    }

    async fn list(&self, tenant: &TenantId) -> Result<Vec<FunctionDeployment>, StateStoreError> {
        let mut records: Vec<_> = self
            .records
            .iter()
            .filter(|r| &r.key.tenant == tenant)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_compare_and_swap_bumps_revision() {
        let store = InMemoryDeploymentStateStore::new();
        let record = FunctionDeployment::new(DeploymentKey::new("acme", "a"));

        let stored = store.compare_and_swap(0, record.clone()).await.unwrap();
        assert_eq!(stored.revision, 1);
        let stored = store.compare_and_swap(1, stored).await.unwrap();
        assert_eq!(stored.revision, 2);
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let store = InMemoryDeploymentStateStore::new();
        let record = FunctionDeployment::new(DeploymentKey::new("acme", "a"));
        store.compare_and_swap(0, record.clone()).await.unwrap();

        let err = store.compare_and_swap(0, record).await.unwrap_err();
        assert!(matches!(
            err,
            StateStoreError::RevisionMismatch { expected: 0, actual: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_list_is_scoped_to_tenant() {
        let store = InMemoryDeploymentStateStore::new();
        for (tenant, processor) in [("acme", "b"), ("acme", "a"), ("other", "a")] {
            store
                .compare_and_swap(0, FunctionDeployment::new(DeploymentKey::new(tenant, processor)))
                .await
                .unwrap();
        }

        let listed = store.list(&TenantId::new("acme")).await.unwrap();
        let names: Vec<_> = listed.iter().map(|r| r.key.processor.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
