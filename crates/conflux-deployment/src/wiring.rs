//! Event-source mapping convergence
//!
//! Mappings are keyed by (source queue, function version). Wiring a new
//! version creates its mappings next to the serving ones; retirement
//! removes mappings the serving version no longer needs. Every step first
//! looks for what a previous attempt left behind, so retries never create a
//! second mapping for a queue and version.

use crate::controller::DeploymentController;
use crate::error::{DeploymentError, Result};
use conflux_convergence::Classification;
use conflux_runtime::{CreateMappingRequest, UpdateMappingRequest};
use conflux_types::{
    DeploymentEvent, DeploymentKey, EventSourceMapping, FunctionName, FunctionTarget, MappingId,
    MappingState, Processor, QueueName,
};
use futures::future::{join_all, try_join_all};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

impl DeploymentController {
    /// Ensure one enabled mapping per input queue targeting `version`
    pub(crate) async fn wire_mappings(
        &self,
        key: &DeploymentKey,
        processor: &Processor,
        function: &FunctionName,
        version: &str,
        batch_size: u32,
        operation_id: Uuid,
    ) -> Result<BTreeMap<QueueName, MappingId>> {
        let existing = self.ctx.functions.list_mappings(function).await?;
        let target = FunctionTarget::new(function.clone(), version);

        let wired = try_join_all(processor.inputs.iter().map(|queue| {
            self.wire_mapping(key, queue, &target, batch_size, &existing, operation_id)
        }))
        .await?;

        Ok(wired.into_iter().collect())
    }

    async fn wire_mapping(
        &self,
        key: &DeploymentKey,
        queue: &QueueName,
        target: &FunctionTarget,
        batch_size: u32,
        existing: &[EventSourceMapping],
        operation_id: Uuid,
    ) -> Result<(QueueName, MappingId)> {
        let source_arn = self.config.account.queue_arn(&key.tenant, queue);

        let reused = match existing
            .iter()
            .find(|m| m.source_arn == source_arn && &m.target == target)
        {
            Some(found) => self.settle_mapping(&found.id).await?,
            None => None,
        };

        let mapping = match reused {
            Some(mapping) => {
                debug!(queue = %queue, mapping_id = %mapping.id, state = %mapping.state, "Reusing mapping");
                mapping
            }
            None => {
                let request = CreateMappingRequest {
                    queue: queue.clone(),
                    source_arn,
                    target: target.clone(),
                    batch_size,
                    enabled: true,
                };
                let created = self.create_or_adopt_mapping(request).await?;
                self.settle_mapping(&created.id)
                    .await?
                    .ok_or_else(|| DeploymentError::ResourceFailed {
                        resource: format!("mapping {}", created.id),
                        reason: "deleted while being created".to_string(),
                    })?
            }
        };

        let mapping = self.reconcile_mapping(mapping, batch_size).await?;
        info!(queue = %queue, mapping_id = %mapping.id, target = %target, "Mapping enabled");
        self.emit(
            DeploymentEvent::MappingConverged {
                key: key.clone(),
                queue: queue.clone(),
                mapping_id: mapping.id.clone(),
            },
            Some(operation_id),
        );
        Ok((queue.clone(), mapping.id))
    }

    async fn create_or_adopt_mapping(&self, request: CreateMappingRequest) -> Result<EventSourceMapping> {
        match self.ctx.functions.create_mapping(request.clone()).await {
            Ok(created) => {
                info!(queue = %request.queue, mapping_id = %created.id, target = %request.target, "Created mapping");
                Ok(created)
            }
            Err(err) if err.is_already_exists() => {
                // Created concurrently since we listed
                let listed = self.ctx.functions.list_mappings(&request.target.function).await?;
                listed
                    .into_iter()
                    .find(|m| m.source_arn == request.source_arn && m.target == request.target)
                    .ok_or_else(|| err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Enable a settled mapping and apply the batch size
    async fn reconcile_mapping(
        &self,
        mapping: EventSourceMapping,
        batch_size: u32,
    ) -> Result<EventSourceMapping> {
        let mut request = UpdateMappingRequest::default();
        if mapping.state == MappingState::Disabled {
            request.enabled = Some(true);
        }
        if mapping.batch_size != batch_size {
            request.batch_size = Some(batch_size);
        }
        if request == UpdateMappingRequest::default() {
            return Ok(mapping);
        }

        self.ctx.functions.update_mapping(&mapping.id, request).await?;
        self.wait_mapping(&mapping.id, MappingState::Enabled).await
    }

    /// Remove mappings that target another version or an undeclared queue
    pub(crate) async fn retire_stale_mappings(
        &self,
        key: &DeploymentKey,
        function: &FunctionName,
        version: &str,
        inputs: &BTreeSet<QueueName>,
        operation_id: Uuid,
    ) -> Result<usize> {
        let stale: Vec<_> = self
            .ctx
            .functions
            .list_mappings(function)
            .await?
            .into_iter()
            .filter(|m| m.target.version != version || !inputs.contains(&m.queue))
            .collect();

        try_join_all(stale.iter().map(|m| self.retire_mapping(key, m, operation_id))).await?;
        Ok(stale.len())
    }

    /// Best-effort removal of every mapping targeting a version that never
    /// went live. A mapping that cannot be retired now is left for the next
    /// attempt to reuse.
    pub(crate) async fn unwire_version(
        &self,
        key: &DeploymentKey,
        function: &FunctionName,
        version: &str,
        operation_id: Uuid,
    ) {
        let mappings = match self.ctx.functions.list_mappings(function).await {
            Ok(mappings) => mappings,
            Err(err) => {
                warn!(version, error = %err, "Could not list mappings of failed version");
                return;
            }
        };
        let orphaned: Vec<_> = mappings
            .into_iter()
            .filter(|m| m.target.version == version)
            .collect();

        let results = join_all(orphaned.iter().map(|m| self.retire_mapping(key, m, operation_id))).await;
        for (mapping, result) in orphaned.iter().zip(results) {
            if let Err(err) = result {
                warn!(mapping_id = %mapping.id, queue = %mapping.queue, error = %err, "Mapping of failed version left in place");
            }
        }
    }

    /// Disable, delete and wait until the mapping is gone
    pub(crate) async fn retire_mapping(
        &self,
        key: &DeploymentKey,
        mapping: &EventSourceMapping,
        operation_id: Uuid,
    ) -> Result<()> {
        let Some(settled) = self.settle_mapping(&mapping.id).await? else {
            debug!(mapping_id = %mapping.id, "Mapping already gone");
            return Ok(());
        };

        if settled.state == MappingState::Enabled {
            self.ctx
                .functions
                .update_mapping(&settled.id, UpdateMappingRequest::disable())
                .await?;
            self.wait_mapping(&settled.id, MappingState::Disabled).await?;
        }

        match self.ctx.functions.delete_mapping(&settled.id).await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        self.wait_mapping_gone(&settled.id).await?;

        info!(queue = %settled.queue, mapping_id = %settled.id, target = %settled.target, "Retired mapping");
        self.emit(
            DeploymentEvent::MappingRetired {
                key: key.clone(),
                queue: settled.queue.clone(),
                mapping_id: settled.id.clone(),
            },
            Some(operation_id),
        );
        Ok(())
    }

    /// Wait out any transient state; `None` if the mapping is gone
    async fn settle_mapping(&self, id: &MappingId) -> Result<Option<EventSourceMapping>> {
        let mapping = self
            .waiter
            .wait(
                &format!("mapping {id}"),
                move || async move { self.ctx.functions.get_mapping(id).await.map_err(DeploymentError::from) },
                |observed: Option<EventSourceMapping>| match observed {
                    None => Classification::Success(None),
                    Some(m) if m.state.is_settled() => Classification::Success(Some(m)),
                    Some(_) => Classification::Retry,
                },
            )
            .await?;
        Ok(mapping)
    }

    /// Wait for `expected`; any other settled state, or deletion, is a failure
    async fn wait_mapping(&self, id: &MappingId, expected: MappingState) -> Result<EventSourceMapping> {
        let resource = format!("mapping {id}");
        let mapping = self
            .waiter
            .wait(
                &resource,
                move || async move { self.ctx.functions.get_mapping(id).await.map_err(DeploymentError::from) },
                |observed: Option<EventSourceMapping>| match observed {
                    Some(m) if m.state == expected => Classification::Success(m),
                    Some(m) if m.state.is_transient() => Classification::Retry,
                    Some(m) => Classification::Fail(DeploymentError::ResourceFailed {
                        resource: resource.clone(),
                        reason: format!("expected {expected}, found {}", m.state),
                    }),
                    None => Classification::Fail(DeploymentError::ResourceFailed {
                        resource: resource.clone(),
                        reason: format!("deleted while waiting for {expected}"),
                    }),
                },
            )
            .await?;
        Ok(mapping)
    }

    async fn wait_mapping_gone(&self, id: &MappingId) -> Result<()> {
        self.waiter
            .wait(
                &format!("mapping {id} deletion"),
                move || async move { self.ctx.functions.get_mapping(id).await.map_err(DeploymentError::from) },
                |observed: Option<EventSourceMapping>| match observed {
                    None => Classification::Success(()),
                    Some(_) => Classification::Retry,
                },
            )
            .await?;
        Ok(())
    }
}
