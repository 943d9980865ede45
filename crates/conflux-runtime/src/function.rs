//! Managed function runtime and event-source mappings

use crate::artifact::CodeArtifact;
use crate::error::Result;
use async_trait::async_trait;
use conflux_types::{EventSourceMapping, FunctionLimits, FunctionName, FunctionTarget, MappingId, QueueName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionState {
    Pending,
    Active,
    Failed,
}

/// Status of the most recent code or configuration update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LastUpdateStatus {
    InProgress,
    Successful,
    Failed,
}

/// Observed function configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfiguration {
    pub name: FunctionName,
    pub arn: String,
    pub role_arn: String,
    pub code_sha256: String,
    pub memory_mb: u32,
    pub timeout_secs: u32,
    pub state: FunctionState,
    pub last_update: LastUpdateStatus,
    pub reserved_concurrency: Option<u32>,

    /// Reason reported with a failed state or update
    pub state_reason: Option<String>,

    pub last_modified: chrono::DateTime<chrono::Utc>,
}

impl FunctionConfiguration {
    /// No create or update is still being applied
    pub fn is_settled(&self) -> bool {
        self.state == FunctionState::Active && self.last_update == LastUpdateStatus::Successful
    }

    pub fn is_failed(&self) -> bool {
        self.state == FunctionState::Failed || self.last_update == LastUpdateStatus::Failed
    }

    pub fn matches_limits(&self, role_arn: &str, limits: &FunctionLimits) -> bool {
        self.role_arn == role_arn
            && self.memory_mb == limits.memory_mb
            && self.timeout_secs == limits.timeout_secs
    }
}

/// Parameters for creating a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFunctionRequest {
    pub name: FunctionName,
    pub role_arn: String,
    pub code: CodeArtifact,
    pub limits: FunctionLimits,
}

/// An immutable published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionVersion {
    pub function: FunctionName,
    pub version: String,
    pub code_sha256: String,
    pub arn: String,
}

/// A named pointer to a published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAlias {
    pub function: FunctionName,
    pub name: String,
    pub version: String,
    pub arn: String,
}

impl fmt::Display for FunctionAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.function, self.name, self.version)
    }
}

/// Parameters for creating an event-source mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMappingRequest {
    pub queue: QueueName,
    pub source_arn: String,
    pub target: FunctionTarget,
    pub batch_size: u32,
    pub enabled: bool,
}

/// Changes to an existing mapping; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMappingRequest {
    pub enabled: Option<bool>,
    pub batch_size: Option<u32>,
}

impl UpdateMappingRequest {
    pub fn enable() -> Self {
        Self {
            enabled: Some(true),
            ..Self::default()
        }
    }

    pub fn disable() -> Self {
        Self {
            enabled: Some(false),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Function runtime of the substrate
///
/// Every mutation is applied asynchronously: callers observe progress by
/// reading the resource again until it settles.
#[async_trait]
pub trait FunctionRuntime: Send + Sync {
    async fn get_function(&self, name: &FunctionName) -> Result<Option<FunctionConfiguration>>;

    async fn create_function(&self, request: CreateFunctionRequest) -> Result<FunctionConfiguration>;

    async fn update_function_code(
        &self,
        name: &FunctionName,
        code: &CodeArtifact,
    ) -> Result<FunctionConfiguration>;

    async fn update_function_configuration(
        &self,
        name: &FunctionName,
        role_arn: &str,
        limits: &FunctionLimits,
    ) -> Result<FunctionConfiguration>;

    /// Publish the current code and configuration as a version.
    ///
    /// If nothing changed since the latest published version, that version
    /// is returned and no new one is created.
    async fn publish_version(&self, name: &FunctionName) -> Result<FunctionVersion>;

    async fn delete_function(&self, name: &FunctionName) -> Result<()>;

    /// `None` removes the reservation
    async fn put_reserved_concurrency(
        &self,
        name: &FunctionName,
        reserved: Option<u32>,
    ) -> Result<()>;

    async fn get_alias(&self, function: &FunctionName, alias: &str) -> Result<Option<FunctionAlias>>;

    async fn create_alias(
        &self,
        function: &FunctionName,
        alias: &str,
        version: &str,
    ) -> Result<FunctionAlias>;

    /// Atomically repoint an existing alias
    async fn update_alias(
        &self,
        function: &FunctionName,
        alias: &str,
        version: &str,
    ) -> Result<FunctionAlias>;

    async fn delete_alias(&self, function: &FunctionName, alias: &str) -> Result<()>;

    /// Mappings targeting any version of a function
    async fn list_mappings(&self, function: &FunctionName) -> Result<Vec<EventSourceMapping>>;

    /// `None` once a deleted mapping is gone
    async fn get_mapping(&self, id: &MappingId) -> Result<Option<EventSourceMapping>>;

    /// Fails with `AlreadyExists` if a mapping for the same queue and
    /// target version already exists
    async fn create_mapping(&self, request: CreateMappingRequest) -> Result<EventSourceMapping>;

    /// Fails with `ResourceConflict` while the mapping is in a transient state
    async fn update_mapping(
        &self,
        id: &MappingId,
        request: UpdateMappingRequest,
    ) -> Result<EventSourceMapping>;

    async fn delete_mapping(&self, id: &MappingId) -> Result<EventSourceMapping>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
