//! Deployment Controller - Deploy, update and tear down processor functions
//!
//! The controller drives one (tenant, processor) pair through the
//! deployment state machine. Every operation takes the lease on the pair's
//! record first; everything after that discovers and reuses what earlier
//! attempts left behind, so a failed operation can simply be retried.

use crate::config::ControllerConfig;
use crate::context::DeploymentContext;
use crate::error::{DeploymentError, Result};
use crate::operation::Operation;
use crate::status::DeploymentStatus;
use conflux_convergence::{Classification, ConvergenceWaiter};
use conflux_roles::{
    processor_access_policy, tenant_boundary_arn, RoleProvisioner, ACCESS_POLICY_NAME,
};
use conflux_runtime::{CodeArtifact, CreateFunctionRequest, FunctionConfiguration};
use conflux_types::{
    CodeArtifactRef, DeployStage, DeploymentEvent, DeploymentEventEnvelope, DeploymentKey,
    DeploymentState, ErrorKind, FunctionDeployment, FunctionLimits, FunctionName,
    OperationKind, Processor, ProcessorName, TenantId,
};
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Orchestrates deployments of processor functions
pub struct DeploymentController {
    pub(crate) ctx: DeploymentContext,
    pub(crate) waiter: ConvergenceWaiter,
    pub(crate) config: ControllerConfig,
    roles: RoleProvisioner,
    event_tx: broadcast::Sender<DeploymentEventEnvelope>,
}

impl DeploymentController {
    /// Create a new controller
    pub fn new(ctx: DeploymentContext, config: ControllerConfig) -> Self {
        let waiter = ConvergenceWaiter::new(config.waiter.clone());
        let roles = RoleProvisioner::new(ctx.roles.clone(), waiter.clone())
            .with_execution_principal(config.execution_principal.clone());
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            ctx,
            waiter,
            config,
            roles,
            event_tx,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Deploy `artifact` as the live code of a processor.
    ///
    /// A cyclic topology, a malformed identifier or an undeclared processor
    /// is rejected before the lease is taken or any substrate call is made.
    /// On any later failure the lease is released, the error is recorded
    /// and the previously live version keeps serving.
    #[instrument(skip_all, fields(tenant = %tenant, processor = %processor, artifact = %artifact))]
    pub async fn deploy(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
        artifact: &CodeArtifactRef,
    ) -> Result<FunctionDeployment> {
        let key = DeploymentKey::new(tenant.clone(), processor.clone());

        let declared = match self.validate_deploy(&key).await {
            Ok(declared) => declared,
            Err(err) => {
                if matches!(err.kind(), ErrorKind::Validation | ErrorKind::NotFound) {
                    warn!(error = %err, "Deploy rejected");
                    self.emit(
                        DeploymentEvent::OperationRejected {
                            key,
                            reason: err.to_string(),
                        },
                        None,
                    );
                }
                return Err(err);
            }
        };

        let mut op = Operation::begin(
            self.ctx.records.clone(),
            &key,
            OperationKind::Deploy,
            &self.config.holder,
            self.config.lease_ttl,
        )
        .await?;
        let operation_id = op.operation_id();
        info!(%operation_id, redeploy = op.record().active_version.is_some(), "Deploy started");
        self.emit(
            DeploymentEvent::OperationStarted {
                key: key.clone(),
                kind: OperationKind::Deploy,
            },
            Some(operation_id),
        );

        let started = Instant::now();
        match self.run_deploy(&mut op, &declared, artifact).await {
            Ok(version) => {
                let record = op.complete(|r| r.state = DeploymentState::Active).await?;
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(version = %version, duration_ms, "Deployment active");
                self.emit(
                    DeploymentEvent::StateChanged {
                        key: key.clone(),
                        state: DeploymentState::Active,
                    },
                    Some(operation_id),
                );
                self.emit(
                    DeploymentEvent::DeploymentActivated {
                        key,
                        version,
                        duration_ms,
                    },
                    Some(operation_id),
                );
                Ok(record)
            }
            Err(err) => Err(self.fail(op, OperationKind::Deploy, err).await),
        }
    }

    /// Remove a processor's mappings, alias and function.
    ///
    /// The execution role is kept. Tearing down a pair that was never
    /// deployed, or is already deleted, succeeds without side effects.
    #[instrument(skip_all, fields(tenant = %tenant, processor = %processor))]
    pub async fn teardown(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
    ) -> Result<FunctionDeployment> {
        tenant.validate()?;
        processor.validate()?;
        let key = DeploymentKey::new(tenant.clone(), processor.clone());

        let Some(current) = self.ctx.records.get(&key).await? else {
            debug!("Nothing deployed");
            return Ok(FunctionDeployment::new(key));
        };
        let leased = current.is_leased(chrono::Utc::now(), self.config.lease_ttl);
        if matches!(current.state, DeploymentState::NotDeployed | DeploymentState::Deleted) && !leased {
            debug!(state = %current.state, "Nothing to tear down");
            return Ok(current);
        }

        let mut op = Operation::begin(
            self.ctx.records.clone(),
            &key,
            OperationKind::Teardown,
            &self.config.holder,
            self.config.lease_ttl,
        )
        .await?;
        let operation_id = op.operation_id();
        info!(%operation_id, "Teardown started");
        self.emit(
            DeploymentEvent::OperationStarted {
                key: key.clone(),
                kind: OperationKind::Teardown,
            },
            Some(operation_id),
        );

        match self.run_teardown(&mut op).await {
            Ok(()) => {
                let record = op
                    .complete(|r| {
                        r.state = DeploymentState::Deleted;
                        r.active_version = None;
                        r.pending_version = None;
                        r.artifact = None;
                        r.code_sha256 = None;
                        r.limits = None;
                        r.mappings.clear();
                    })
                    .await?;
                info!("Teardown complete");
                self.emit(
                    DeploymentEvent::StateChanged {
                        key: key.clone(),
                        state: DeploymentState::Deleted,
                    },
                    Some(operation_id),
                );
                self.emit(DeploymentEvent::TeardownCompleted { key }, Some(operation_id));
                Ok(record)
            }
            Err(err) => Err(self.fail(op, OperationKind::Teardown, err).await),
        }
    }

    /// The persisted record together with the live alias and mappings
    #[instrument(skip_all, fields(tenant = %tenant, processor = %processor))]
    pub async fn get_deployment_status(
        &self,
        tenant: &TenantId,
        processor: &ProcessorName,
    ) -> Result<DeploymentStatus> {
        tenant.validate()?;
        processor.validate()?;
        let key = DeploymentKey::new(tenant.clone(), processor.clone());

        let record = self
            .ctx
            .records
            .get(&key)
            .await?
            .unwrap_or_else(|| FunctionDeployment::new(key));

        let mappings = self.ctx.functions.list_mappings(&record.function_name).await?;
        let alias = match self
            .ctx
            .functions
            .get_alias(&record.function_name, &self.config.alias_name)
            .await
        {
            Ok(alias) => alias,
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err.into()),
        };

        Ok(DeploymentStatus {
            record,
            alias,
            mappings,
        })
    }

    /// Records of every processor of a tenant that has been operated on
    pub async fn list_deployments(&self, tenant: &TenantId) -> Result<Vec<FunctionDeployment>> {
        tenant.validate()?;
        Ok(self.ctx.records.list(tenant).await?)
    }

    /// Identifier, catalog and topology checks; no side effects
    async fn validate_deploy(&self, key: &DeploymentKey) -> Result<Processor> {
        key.tenant.validate()?;
        key.processor.validate()?;

        let processors = self.ctx.catalog.list_processors(&key.tenant).await?;
        let declared = processors
            .iter()
            .find(|p| p.name == key.processor)
            .cloned()
            .ok_or_else(|| DeploymentError::ProcessorNotFound(key.clone()))?;
        declared.validate()?;

        conflux_topology::ensure_acyclic(&processors)?;
        Ok(declared)
    }

    async fn run_deploy(
        &self,
        op: &mut Operation,
        processor: &Processor,
        artifact: &CodeArtifactRef,
    ) -> Result<String> {
        let key = op.record().key.clone();
        let function = op.record().function_name.clone();
        let role_name = op.record().role_name.clone();
        let redeploy = op.record().active_version.is_some();
        let operation_id = op.operation_id();

        // Execution role and queue access
        self.enter_stage(op, DeployStage::RoleProvisioning, redeploy).await?;
        let boundary = self
            .config
            .permission_boundaries
            .then(|| tenant_boundary_arn(&self.config.account, &key.tenant));
        let role = self
            .roles
            .get_or_create_role(
                &role_name,
                boundary.as_deref(),
                &format!("Execution role for processor {key}"),
            )
            .await?;
        let policy = processor_access_policy(&self.config.account, processor, &function);
        self.roles
            .ensure_policy_attached(&role_name, ACCESS_POLICY_NAME, &policy)
            .await?;
        self.ensure_queues(processor, &role.arn).await?;
        let role_arn = role.arn.clone();
        op.update(|r| r.role_arn = Some(role_arn)).await?;

        // Code
        self.enter_stage(op, DeployStage::CodeUploading, redeploy).await?;
        let code = self.ctx.artifacts.resolve(artifact).await?;
        let plan = self.ctx.catalog.tenant_plan(&key.tenant).await?;
        let limits = plan.clamp(&processor.limits);
        self.upload_code(&function, &role.arn, &code, &limits).await?;

        // Immutable version
        self.enter_stage(op, DeployStage::VersionPublishing, redeploy).await?;
        let published = self.ctx.functions.publish_version(&function).await?;
        let version = published.version.clone();
        info!(version = %version, code_sha256 = %published.code_sha256, "Published version");
        self.emit(
            DeploymentEvent::VersionPublished {
                key: key.clone(),
                version: version.clone(),
                code_sha256: published.code_sha256.clone(),
            },
            Some(operation_id),
        );
        op.update(|r| r.pending_version = Some(version.clone())).await?;

        // New mappings come up next to the ones still serving
        self.enter_stage(op, DeployStage::EventSourceWiring, redeploy).await?;
        let mappings = self
            .wire_mappings(&key, processor, &function, &version, limits.batch_size, operation_id)
            .await?;

        // Cut over, then retire what the new version replaced
        self.repoint_alias(&key, &function, &version, operation_id).await?;
        op.update(|r| {
            r.active_version = Some(version.clone());
            r.pending_version = None;
            r.mappings = mappings;
            r.artifact = Some(artifact.clone());
            r.code_sha256 = Some(published.code_sha256.clone());
            r.limits = Some(limits);
        })
        .await?;

        let retired = self
            .retire_stale_mappings(&key, &function, &version, &processor.inputs, operation_id)
            .await?;
        if retired > 0 {
            info!(retired, "Retired stale mappings");
        }

        self.ctx
            .functions
            .put_reserved_concurrency(&function, limits.reserved_concurrency)
            .await?;
        Ok(version)
    }

    async fn run_teardown(&self, op: &mut Operation) -> Result<()> {
        let key = op.record().key.clone();
        let function = op.record().function_name.clone();
        let operation_id = op.operation_id();

        op.update(|r| r.state = DeploymentState::TearingDown).await?;
        self.emit(
            DeploymentEvent::StateChanged {
                key: key.clone(),
                state: DeploymentState::TearingDown,
            },
            Some(operation_id),
        );

        let mappings = self.ctx.functions.list_mappings(&function).await?;
        futures::future::try_join_all(
            mappings
                .iter()
                .map(|m| self.retire_mapping(&key, m, operation_id)),
        )
        .await?;

        match self
            .ctx
            .functions
            .delete_alias(&function, &self.config.alias_name)
            .await
        {
            Ok(()) => info!(alias = %self.config.alias_name, "Deleted alias"),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }

        match self.ctx.functions.delete_function(&function).await {
            Ok(()) => info!(function = %function, "Deleted function"),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
        Ok(())
    }

    async fn enter_stage(&self, op: &mut Operation, stage: DeployStage, redeploy: bool) -> Result<()> {
        let state = DeploymentState::for_stage(stage, redeploy);
        op.update(|r| r.state = state).await?;
        info!(state = %state, "Deploy stage");
        self.emit(
            DeploymentEvent::StateChanged {
                key: op.record().key.clone(),
                state,
            },
            Some(op.operation_id()),
        );
        Ok(())
    }

    /// Create declared queues and let the role consume the inputs
    async fn ensure_queues(&self, processor: &Processor, role_arn: &str) -> Result<()> {
        for queue in processor.inputs.iter().chain(processor.outputs.iter()) {
            self.ctx.queues.create_queue(&processor.tenant, queue).await?;
        }
        for queue in &processor.inputs {
            let queue_arn = self.config.account.queue_arn(&processor.tenant, queue);
            self.ctx.queues.grant_consume(&queue_arn, role_arn).await?;
            debug!(queue = %queue, "Granted consume");
        }
        Ok(())
    }

    /// Create the function or bring its code and configuration up to date
    async fn upload_code(
        &self,
        function: &FunctionName,
        role_arn: &str,
        code: &CodeArtifact,
        limits: &FunctionLimits,
    ) -> Result<()> {
        let Some(current) = self.ctx.functions.get_function(function).await? else {
            let request = CreateFunctionRequest {
                name: function.clone(),
                role_arn: role_arn.to_string(),
                code: code.clone(),
                limits: *limits,
            };
            match self.ctx.functions.create_function(request).await {
                Ok(_) => info!(function = %function, code_sha256 = %code.sha256, "Created function"),
                Err(err) if err.is_already_exists() => debug!("Function created concurrently"),
                Err(err) => return Err(err.into()),
            }
            self.wait_function(function, true).await?;
            return Ok(());
        };

        // A previous attempt may have left an update in flight
        let current = if current.is_settled() || current.is_failed() {
            current
        } else {
            self.wait_function(function, false).await?
        };

        // A failed update is re-applied even when the digest already matches
        if current.is_failed() || current.code_sha256 != code.sha256 {
            self.ctx.functions.update_function_code(function, code).await?;
            info!(function = %function, code_sha256 = %code.sha256, "Updated function code");
            self.wait_function(function, true).await?;
        }
        if !current.matches_limits(role_arn, limits) {
            self.ctx
                .functions
                .update_function_configuration(function, role_arn, limits)
                .await?;
            info!(
                function = %function,
                memory_mb = limits.memory_mb,
                timeout_secs = limits.timeout_secs,
                "Updated function configuration"
            );
            self.wait_function(function, true).await?;
        }
        Ok(())
    }

    /// Wait until no update is in progress. With `strict`, a failed update
    /// is an error; otherwise it only ends the wait.
    async fn wait_function(&self, function: &FunctionName, strict: bool) -> Result<FunctionConfiguration> {
        let resource = format!("function {function}");
        let config = self
            .waiter
            .wait(
                &resource,
                move || async move {
                    self.ctx
                        .functions
                        .get_function(function)
                        .await
                        .map_err(DeploymentError::from)
                },
                |observed: Option<FunctionConfiguration>| match observed {
                    Some(c) if c.is_settled() => Classification::Success(c),
                    Some(c) if c.is_failed() && !strict => Classification::Success(c),
                    Some(c) if c.is_failed() => Classification::Fail(DeploymentError::ResourceFailed {
                        resource: resource.clone(),
                        reason: c
                            .state_reason
                            .unwrap_or_else(|| "update failed".to_string()),
                    }),
                    Some(_) => Classification::Retry,
                    None => Classification::Fail(DeploymentError::ResourceFailed {
                        resource: resource.clone(),
                        reason: "deleted during update".to_string(),
                    }),
                },
            )
            .await?;
        Ok(config)
    }

    /// Point the alias at `version`, creating it on first deploy
    async fn repoint_alias(
        &self,
        key: &DeploymentKey,
        function: &FunctionName,
        version: &str,
        operation_id: Uuid,
    ) -> Result<()> {
        let alias = &self.config.alias_name;
        let from = match self.ctx.functions.get_alias(function, alias).await? {
            Some(current) if current.version == version => {
                debug!(alias = %alias, version, "Alias already points at version");
                return Ok(());
            }
            Some(current) => {
                self.ctx.functions.update_alias(function, alias, version).await?;
                Some(current.version)
            }
            None => {
                match self.ctx.functions.create_alias(function, alias, version).await {
                    Ok(_) => {}
                    Err(err) if err.is_already_exists() => {
                        self.ctx.functions.update_alias(function, alias, version).await?;
                    }
                    Err(err) => return Err(err.into()),
                }
                None
            }
        };

        info!(alias = %alias, from = ?from, to = version, "Alias repointed");
        self.emit(
            DeploymentEvent::AliasRepointed {
                key: key.clone(),
                from,
                to: version.to_string(),
            },
            Some(operation_id),
        );
        Ok(())
    }

    /// Release the lease, record the error and report the failure
    async fn fail(&self, op: Operation, kind: OperationKind, err: DeploymentError) -> DeploymentError {
        let key = op.record().key.clone();
        let operation_id = op.operation_id();
        let serving = op.record().active_version.is_some();
        warn!(%operation_id, error = %err, retryable = err.is_retryable(), "{kind} failed");

        if kind == OperationKind::Deploy {
            let record = op.record();
            if let Some(pending) = record
                .pending_version
                .as_deref()
                .filter(|v| record.active_version.as_deref() != Some(*v))
            {
                self.unwire_version(&key, &record.function_name, pending, operation_id)
                    .await;
            }
        }

        let released = op
            .abort(&err, |r| {
                r.pending_version = None;
                if kind == OperationKind::Deploy && serving {
                    r.state = DeploymentState::Active;
                }
            })
            .await;
        if let Err(release_err) = released {
            warn!(%operation_id, error = %release_err, "Failed to release lease");
        }

        self.emit(
            DeploymentEvent::OperationFailed {
                key,
                kind,
                reason: err.to_string(),
                retryable: err.is_retryable(),
            },
            Some(operation_id),
        );
        err
    }

    pub(crate) fn emit(&self, event: DeploymentEvent, operation_id: Option<Uuid>) {
        let envelope = DeploymentEventEnvelope::new(event, operation_id);
        let _ = self.event_tx.send(envelope);
    }
}
