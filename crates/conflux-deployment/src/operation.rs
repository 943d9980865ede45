//! Leased operations on a deployment record

use crate::error::{DeploymentError, Result};
use crate::state::{DeploymentStateStore, StateStoreError};
use conflux_types::{DeploymentKey, FunctionDeployment, OperationKind, OperationLease};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// An operation holding the lease on one record
///
/// Every write goes through compare-and-set on the revision this operation
/// last wrote. If another instance takes the lease over, the next write
/// fails with [`DeploymentError::LeaseLost`].
pub(crate) struct Operation {
    store: Arc<dyn DeploymentStateStore>,
    record: FunctionDeployment,
    operation_id: Uuid,
}

impl Operation {
    /// Take the lease, or fail with `Conflict` if a live lease is held
    pub(crate) async fn begin(
        store: Arc<dyn DeploymentStateStore>,
        key: &DeploymentKey,
        kind: OperationKind,
        holder: &str,
        ttl: Duration,
    ) -> Result<Self> {
        let current = store
            .get(key)
            .await?
            .unwrap_or_else(|| FunctionDeployment::new(key.clone()));

        if let Some(held) = &current.lease {
            if !held.is_expired(chrono::Utc::now(), ttl) {
                return Err(conflict(key, held));
            }
            warn!(
                key = %key,
                holder = %held.holder,
                operation_id = %held.operation_id,
                acquired_at = %held.acquired_at,
                "Taking over expired lease"
            );
        }

        let lease = OperationLease::new(kind, holder);
        let operation_id = lease.operation_id;
        let mut next = current.clone();
        next.lease = Some(lease);

        match store.compare_and_swap(current.revision, next).await {
            Ok(record) => Ok(Self {
                store,
                record,
                operation_id,
            }),
            Err(StateStoreError::RevisionMismatch { .. }) => {
                // Lost the race; report whoever won it
                let winner = store.get(key).await?.and_then(|r| r.lease);
                Err(match winner {
                    Some(held) => conflict(key, &held),
                    None => DeploymentError::LeaseLost(key.clone()),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) fn record(&self) -> &FunctionDeployment {
        &self.record
    }

    pub(crate) fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    pub(crate) async fn update(&mut self, apply: impl FnOnce(&mut FunctionDeployment)) -> Result<()> {
        let mut next = self.record.clone();
        apply(&mut next);
        self.record = self.commit(next).await?;
        Ok(())
    }

    /// Apply the final changes and release the lease
    pub(crate) async fn complete(
        self,
        apply: impl FnOnce(&mut FunctionDeployment),
    ) -> Result<FunctionDeployment> {
        let mut next = self.record.clone();
        apply(&mut next);
        next.lease = None;
        next.last_error = None;
        self.commit(next).await
    }

    /// Record the failure and release the lease
    pub(crate) async fn abort(
        self,
        error: &DeploymentError,
        apply: impl FnOnce(&mut FunctionDeployment),
    ) -> Result<FunctionDeployment> {
        let mut next = self.record.clone();
        apply(&mut next);
        next.lease = None;
        next.last_error = Some(error.to_string());
        self.commit(next).await
    }

    async fn commit(&self, next: FunctionDeployment) -> Result<FunctionDeployment> {
        self.store
            .compare_and_swap(self.record.revision, next)
            .await
            .map_err(|err| match err {
                StateStoreError::RevisionMismatch { key, .. } => DeploymentError::LeaseLost(key),
                other => other.into(),
            })
    }
}

fn conflict(key: &DeploymentKey, held: &OperationLease) -> DeploymentError {
    DeploymentError::Conflict {
        key: key.clone(),
        kind: held.kind,
        holder: held.holder.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InMemoryDeploymentStateStore;

    const TTL: Duration = Duration::from_secs(900);

    fn store() -> Arc<dyn DeploymentStateStore> {
        Arc::new(InMemoryDeploymentStateStore::new())
    }

    #[tokio::test]
    async fn test_live_lease_conflicts() {
        let store = store();
        let key = DeploymentKey::new("acme", "a");
        let _held = Operation::begin(store.clone(), &key, OperationKind::Deploy, "cp-1", TTL)
            .await
            .unwrap();

        let err = Operation::begin(store, &key, OperationKind::Teardown, "cp-2", TTL)
            .await
            .err()
            .unwrap();
        match err {
            DeploymentError::Conflict { holder, kind, .. } => {
                assert_eq!(holder, "cp-1");
                assert_eq!(kind, OperationKind::Deploy);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completed_operation_releases_lease() {
        let store = store();
        let key = DeploymentKey::new("acme", "a");
        let mut op = Operation::begin(store.clone(), &key, OperationKind::Deploy, "cp-1", TTL)
            .await
            .unwrap();
        op.update(|r| r.pending_version = Some("1".into())).await.unwrap();
        let record = op.complete(|r| r.active_version = Some("1".into())).await.unwrap();

        assert!(record.lease.is_none());
        assert_eq!(record.revision, 3);
        assert!(Operation::begin(store, &key, OperationKind::Deploy, "cp-2", TTL).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over_and_old_holder_loses_it() {
        let store = store();
        let key = DeploymentKey::new("acme", "a");
        let mut stale = Operation::begin(store.clone(), &key, OperationKind::Deploy, "cp-1", TTL)
            .await
            .unwrap();

        let taken = Operation::begin(store, &key, OperationKind::Deploy, "cp-2", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(taken.record().lease.as_ref().map(|l| l.holder.as_str()), Some("cp-2"));

        let err = stale.update(|r| r.pending_version = Some("1".into())).await.unwrap_err();
        assert!(matches!(err, DeploymentError::LeaseLost(_)));
    }

    #[tokio::test]
    async fn test_abort_records_error() {
        let store = store();
        let key = DeploymentKey::new("acme", "a");
        let op = Operation::begin(store.clone(), &key, OperationKind::Deploy, "cp-1", TTL)
            .await
            .unwrap();
        let err = DeploymentError::ProcessorNotFound(key.clone());
        let record = op.abort(&err, |_| {}).await.unwrap();

        assert!(record.lease.is_none());
        assert_eq!(record.last_error, Some(err.to_string()));
        assert_eq!(store.get(&key).await.unwrap(), Some(record));
    }
}
