use super::{OperationHooks, SimulationConfig};
use crate::artifact::CodeArtifact;
use crate::error::{Result, RuntimeError};
use crate::function::{
    CreateFunctionRequest, CreateMappingRequest, FunctionAlias, FunctionConfiguration,
    FunctionRuntime, FunctionState, FunctionVersion, LastUpdateStatus, UpdateMappingRequest,
};
use async_trait::async_trait;
use chrono::Utc;
use conflux_types::{
    EventSourceMapping, FunctionLimits, FunctionName, MappingId, MappingState, SubstrateAccount,
};
use dashmap::{DashMap, DashSet};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Published {
    version: FunctionVersion,
    role_arn: String,
    memory_mb: u32,
    timeout_secs: u32,
}

impl Published {
    fn matches(&self, config: &FunctionConfiguration) -> bool {
        self.version.code_sha256 == config.code_sha256
            && self.role_arn == config.role_arn
            && self.memory_mb == config.memory_mb
            && self.timeout_secs == config.timeout_secs
    }
}

#[derive(Debug)]
struct FunctionRecord {
    config: FunctionConfiguration,
    settle_reads: u32,
    failure: Option<String>,
    published: Vec<Published>,
    aliases: BTreeMap<String, FunctionAlias>,
}

impl FunctionRecord {
    fn observe(&mut self) {
        if self.config.is_settled() || self.config.is_failed() {
            return;
        }
        if self.settle_reads > 0 {
            self.settle_reads -= 1;
            return;
        }
        match self.failure.take() {
            Some(reason) => {
                if self.config.state == FunctionState::Pending {
                    self.config.state = FunctionState::Failed;
                }
                self.config.last_update = LastUpdateStatus::Failed;
                self.config.state_reason = Some(reason);
            }
            None => {
                self.config.state = FunctionState::Active;
                self.config.last_update = LastUpdateStatus::Successful;
                self.config.state_reason = None;
            }
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.config.last_update == LastUpdateStatus::InProgress
            || self.config.state == FunctionState::Pending
        {
            return Err(RuntimeError::ResourceConflict(format!(
                "an update is in progress for function {}",
                self.config.name
            )));
        }
        Ok(())
    }

    fn begin_update(&mut self, settle_reads: u32, failure: Option<String>) {
        self.config.last_update = LastUpdateStatus::InProgress;
        self.config.last_modified = Utc::now();
        self.settle_reads = settle_reads;
        self.failure = failure;
    }

    fn version(&self, version: &str) -> Result<&Published> {
        self.published
            .iter()
            .find(|p| p.version.version == version)
            .ok_or_else(|| {
                RuntimeError::not_found(
                    "function version",
                    format!("{}:{}", self.config.name, version),
                )
            })
    }
}

#[derive(Debug, Clone, Copy)]
enum Settle {
    To(MappingState),
    Gone,
}

#[derive(Debug)]
struct MappingRecord {
    mapping: EventSourceMapping,
    settle: Settle,
    reads_left: u32,
}

impl MappingRecord {
    /// Observe the mapping once; `None` when a delete has completed
    fn advance(&mut self, stalled: bool) -> Option<EventSourceMapping> {
        if !self.mapping.state.is_transient() || stalled {
            return Some(self.mapping.clone());
        }
        if self.reads_left > 0 {
            self.reads_left -= 1;
            return Some(self.mapping.clone());
        }
        match self.settle {
            Settle::To(state) => {
                self.mapping.state = state;
                self.mapping.last_modified = Utc::now();
                Some(self.mapping.clone())
            }
            Settle::Gone => None,
        }
    }

    fn transition(&mut self, through: MappingState, settle: Settle, reads: u32) {
        self.mapping.state = through;
        self.mapping.last_modified = Utc::now();
        self.settle = settle;
        self.reads_left = reads;
    }
}

/// In-memory function runtime
///
/// Function creates and updates settle after
/// [`SimulationConfig::function_settle_reads`] reads; mapping transitions
/// settle after [`SimulationConfig::mapping_transition_reads`] reads of that
/// mapping. Mappings from a stalled source queue never leave their
/// transient state.
#[derive(Debug)]
pub struct InMemoryFunctionRuntime {
    account: SubstrateAccount,
    settings: SimulationConfig,
    functions: DashMap<FunctionName, FunctionRecord>,
    mappings: DashMap<MappingId, MappingRecord>,
    stalled_sources: DashSet<String>,
    update_failures: DashMap<FunctionName, String>,
    hooks: OperationHooks,
}

impl InMemoryFunctionRuntime {
    pub fn new(account: SubstrateAccount, settings: SimulationConfig) -> Self {
        Self {
            account,
            settings,
            functions: DashMap::new(),
            mappings: DashMap::new(),
            stalled_sources: DashSet::new(),
            update_failures: DashMap::new(),
            hooks: OperationHooks::new(),
        }
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }

    /// Keep mappings of a source queue in their transient state
    pub fn stall_source(&self, source_arn: impl Into<String>) {
        self.stalled_sources.insert(source_arn.into());
    }

    pub fn release_source(&self, source_arn: &str) {
        self.stalled_sources.remove(source_arn);
    }

    /// Make the next create or update of a function end in a failed state
    pub fn fail_next_update(&self, function: &FunctionName, reason: impl Into<String>) {
        self.update_failures.insert(function.clone(), reason.into());
    }

    /// Every mapping, without advancing any transition
    pub fn all_mappings(&self) -> Vec<EventSourceMapping> {
        let mut all: Vec<_> = self.mappings.iter().map(|r| r.mapping.clone()).collect();
        all.sort_by(|a, b| (&a.queue, &a.target.version).cmp(&(&b.queue, &b.target.version)));
        all
    }

    pub fn published_versions(&self, function: &FunctionName) -> Vec<String> {
        self.functions
            .get(function)
            .map(|f| f.published.iter().map(|p| p.version.version.clone()).collect())
            .unwrap_or_default()
    }

    pub fn function_exists(&self, function: &FunctionName) -> bool {
        self.functions.contains_key(function)
    }

    fn take_failure(&self, function: &FunctionName) -> Option<String> {
        self.update_failures.remove(function).map(|(_, reason)| reason)
    }

    fn not_found(function: &FunctionName) -> RuntimeError {
        RuntimeError::not_found("function", function.as_str())
    }

    fn alias(&self, function: &FunctionName, alias: &str, version: &str) -> FunctionAlias {
        FunctionAlias {
            function: function.clone(),
            name: alias.to_string(),
            version: version.to_string(),
            arn: self.account.function_arn(function, Some(alias)),
        }
    }
}

#[async_trait]
impl FunctionRuntime for InMemoryFunctionRuntime {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn get_function(&self, name: &FunctionName) -> Result<Option<FunctionConfiguration>> {
        self.hooks.enter("get_function")?;
        Ok(self.functions.get_mut(name).map(|mut record| {
            record.observe();
            record.config.clone()
        }))
    }

    async fn create_function(&self, request: CreateFunctionRequest) -> Result<FunctionConfiguration> {
        self.hooks.enter("create_function")?;
        let failure = self.take_failure(&request.name);
        let config = FunctionConfiguration {
            arn: self.account.function_arn(&request.name, None),
            name: request.name.clone(),
            role_arn: request.role_arn,
            code_sha256: request.code.sha256,
            memory_mb: request.limits.memory_mb,
            timeout_secs: request.limits.timeout_secs,
            state: FunctionState::Pending,
            last_update: LastUpdateStatus::InProgress,
            reserved_concurrency: None,
            state_reason: None,
            last_modified: Utc::now(),
        };

        match self.functions.entry(request.name) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Err(RuntimeError::already_exists(
                "function",
                entry.key().as_str(),
            )),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(FunctionRecord {
                    config: config.clone(),
                    settle_reads: self.settings.function_settle_reads,
                    failure,
                    published: Vec::new(),
                    aliases: BTreeMap::new(),
                });
                Ok(config)
            }
        }
    }

    async fn update_function_code(
        &self,
        name: &FunctionName,
        code: &CodeArtifact,
    ) -> Result<FunctionConfiguration> {
        self.hooks.enter("update_function_code")?;
        let failure = self.take_failure(name);
        let mut record = self.functions.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        record.ensure_idle()?;
        record.config.code_sha256 = code.sha256.clone();
        record.begin_update(self.settings.function_settle_reads, failure);
        Ok(record.config.clone())
    }

    async fn update_function_configuration(
        &self,
        name: &FunctionName,
        role_arn: &str,
        limits: &FunctionLimits,
    ) -> Result<FunctionConfiguration> {
        self.hooks.enter("update_function_configuration")?;
        let failure = self.take_failure(name);
        let mut record = self.functions.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        record.ensure_idle()?;
        record.config.role_arn = role_arn.to_string();
        record.config.memory_mb = limits.memory_mb;
        record.config.timeout_secs = limits.timeout_secs;
        record.begin_update(self.settings.function_settle_reads, failure);
        Ok(record.config.clone())
    }

    async fn publish_version(&self, name: &FunctionName) -> Result<FunctionVersion> {
        self.hooks.enter("publish_version")?;
        let mut record = self.functions.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        record.ensure_idle()?;

        if let Some(latest) = record.published.last() {
            if latest.matches(&record.config) {
                return Ok(latest.version.clone());
            }
        }

        let number = (record.published.len() + 1).to_string();
        let version = FunctionVersion {
            function: name.clone(),
            arn: self.account.function_arn(name, Some(&number)),
            version: number,
            code_sha256: record.config.code_sha256.clone(),
        };
        let published = Published {
            version: version.clone(),
            role_arn: record.config.role_arn.clone(),
            memory_mb: record.config.memory_mb,
            timeout_secs: record.config.timeout_secs,
        };
        record.published.push(published);
        Ok(version)
    }

    async fn delete_function(&self, name: &FunctionName) -> Result<()> {
        self.hooks.enter("delete_function")?;
        if !self.functions.contains_key(name) {
            return Err(Self::not_found(name));
        }
        let attached = self
            .mappings
            .iter()
            .filter(|r| &r.mapping.target.function == name)
            .count();
        if attached > 0 {
            return Err(RuntimeError::ResourceConflict(format!(
                "function {name} still has {attached} event source mappings"
            )));
        }
        self.functions.remove(name);
        Ok(())
    }

    async fn put_reserved_concurrency(
        &self,
        name: &FunctionName,
        reserved: Option<u32>,
    ) -> Result<()> {
        self.hooks.enter("put_reserved_concurrency")?;
        let mut record = self.functions.get_mut(name).ok_or_else(|| Self::not_found(name))?;
        record.config.reserved_concurrency = reserved;
        Ok(())
    }

    async fn get_alias(&self, function: &FunctionName, alias: &str) -> Result<Option<FunctionAlias>> {
        self.hooks.enter("get_alias")?;
        let record = self
            .functions
            .get(function)
            .ok_or_else(|| Self::not_found(function))?;
        Ok(record.aliases.get(alias).cloned())
    }

    async fn create_alias(
        &self,
        function: &FunctionName,
        alias: &str,
        version: &str,
    ) -> Result<FunctionAlias> {
        self.hooks.enter("create_alias")?;
        let created = self.alias(function, alias, version);
        let mut record = self
            .functions
            .get_mut(function)
            .ok_or_else(|| Self::not_found(function))?;
        record.version(version)?;
        if record.aliases.contains_key(alias) {
            return Err(RuntimeError::already_exists("alias", created.arn));
        }
        record.aliases.insert(alias.to_string(), created.clone());
        Ok(created)
    }

    async fn update_alias(
        &self,
        function: &FunctionName,
        alias: &str,
        version: &str,
    ) -> Result<FunctionAlias> {
        self.hooks.enter("update_alias")?;
        let updated = self.alias(function, alias, version);
        let mut record = self
            .functions
            .get_mut(function)
            .ok_or_else(|| Self::not_found(function))?;
        record.version(version)?;
        match record.aliases.get_mut(alias) {
            Some(existing) => {
                *existing = updated.clone();
                Ok(updated)
            }
            None => Err(RuntimeError::not_found("alias", updated.arn)),
        }
    }

    async fn delete_alias(&self, function: &FunctionName, alias: &str) -> Result<()> {
        self.hooks.enter("delete_alias")?;
        let mut record = self
            .functions
            .get_mut(function)
            .ok_or_else(|| Self::not_found(function))?;
        match record.aliases.remove(alias) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::not_found(
                "alias",
                format!("{function}:{alias}"),
            )),
        }
    }

    async fn list_mappings(&self, function: &FunctionName) -> Result<Vec<EventSourceMapping>> {
        self.hooks.enter("list_mappings")?;
        let mut mappings: Vec<_> = self
            .mappings
            .iter()
            .filter(|r| &r.mapping.target.function == function)
            .map(|r| r.mapping.clone())
            .collect();
        mappings.sort_by(|a, b| (&a.queue, &a.target.version).cmp(&(&b.queue, &b.target.version)));
        Ok(mappings)
    }

    async fn get_mapping(&self, id: &MappingId) -> Result<Option<EventSourceMapping>> {
        self.hooks.enter("get_mapping")?;
        let observed = match self.mappings.get_mut(id) {
            Some(mut record) => {
                let stalled = self.stalled_sources.contains(&record.mapping.source_arn);
                record.advance(stalled)
            }
            None => return Ok(None),
        };
        if observed.is_none() {
            self.mappings.remove(id);
        }
        Ok(observed)
    }

    async fn create_mapping(&self, request: CreateMappingRequest) -> Result<EventSourceMapping> {
        self.hooks.enter("create_mapping")?;
        {
            let record = self
                .functions
                .get(&request.target.function)
                .ok_or_else(|| Self::not_found(&request.target.function))?;
            record.version(&request.target.version)?;
        }

        let duplicate = self
            .mappings
            .iter()
            .find(|r| r.mapping.source_arn == request.source_arn && r.mapping.target == request.target)
            .map(|r| r.mapping.id.clone());
        if let Some(id) = duplicate {
            return Err(RuntimeError::already_exists("event source mapping", id.as_str()));
        }

        let settled = if request.enabled {
            MappingState::Enabled
        } else {
            MappingState::Disabled
        };
        let mapping = EventSourceMapping {
            id: MappingId::generate(),
            queue: request.queue,
            source_arn: request.source_arn,
            target: request.target,
            batch_size: request.batch_size,
            state: MappingState::Creating,
            last_modified: Utc::now(),
        };
        self.mappings.insert(
            mapping.id.clone(),
            MappingRecord {
                mapping: mapping.clone(),
                settle: Settle::To(settled),
                reads_left: self.settings.mapping_transition_reads,
            },
        );
        Ok(mapping)
    }

    async fn update_mapping(
        &self,
        id: &MappingId,
        request: UpdateMappingRequest,
    ) -> Result<EventSourceMapping> {
        self.hooks.enter("update_mapping")?;
        let reads = self.settings.mapping_transition_reads;
        let mut record = self
            .mappings
            .get_mut(id)
            .ok_or_else(|| RuntimeError::not_found("event source mapping", id.as_str()))?;
        let current = record.mapping.state;
        if current.is_transient() {
            return Err(RuntimeError::ResourceConflict(format!(
                "event source mapping {id} is {current}"
            )));
        }

        let batch_changed = match request.batch_size {
            Some(size) if size != record.mapping.batch_size => {
                record.mapping.batch_size = size;
                true
            }
            _ => false,
        };

        match (request.enabled, current) {
            (Some(true), MappingState::Disabled) => {
                record.transition(MappingState::Enabling, Settle::To(MappingState::Enabled), reads)
            }
            (Some(false), MappingState::Enabled) => {
                record.transition(MappingState::Disabling, Settle::To(MappingState::Disabled), reads)
            }
            _ if batch_changed => record.transition(MappingState::Updating, Settle::To(current), reads),
            _ => {}
        }
        Ok(record.mapping.clone())
    }

    async fn delete_mapping(&self, id: &MappingId) -> Result<EventSourceMapping> {
        self.hooks.enter("delete_mapping")?;
        let reads = self.settings.mapping_transition_reads;
        let mut record = self
            .mappings
            .get_mut(id)
            .ok_or_else(|| RuntimeError::not_found("event source mapping", id.as_str()))?;
        match record.mapping.state {
            MappingState::Deleting => {}
            state if state.is_transient() => {
                return Err(RuntimeError::ResourceConflict(format!(
                    "event source mapping {id} is {state}"
                )))
            }
            _ => record.transition(MappingState::Deleting, Settle::Gone, reads),
        }
        Ok(record.mapping.clone())
    }
}
