//! Deployment records for managed functions
//!
//! A FunctionDeployment is the persisted record for one (tenant, processor)
//! pair. It carries the lifecycle state, the version the `active` alias
//! points at, the wired mappings and the operation lease that serializes
//! deploy/teardown calls across control-plane instances.

use crate::ids::{FunctionName, MappingId, ProcessorName, QueueName, RoleName, TenantId};
use crate::naming;
use crate::processor::{CodeArtifactRef, ProcessorLimits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Key of a deployment record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeploymentKey {
    pub tenant: TenantId,
    pub processor: ProcessorName,
}

impl DeploymentKey {
    pub fn new(tenant: impl Into<TenantId>, processor: impl Into<ProcessorName>) -> Self {
        Self {
            tenant: tenant.into(),
            processor: processor.into(),
        }
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.processor)
    }
}

/// Persisted deployment record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeployment {
    /// Owning pair
    pub key: DeploymentKey,

    /// Deterministic function name
    pub function_name: FunctionName,

    /// Deterministic execution role name
    pub role_name: RoleName,

    /// Role ARN once the role is provisioned
    pub role_arn: Option<String>,

    /// Lifecycle state
    pub state: DeploymentState,

    /// Version the active alias points at
    pub active_version: Option<String>,

    /// Version being rolled out by the in-flight deploy
    pub pending_version: Option<String>,

    /// Artifact behind the active version
    pub artifact: Option<CodeArtifactRef>,

    /// Code digest behind the active version
    pub code_sha256: Option<String>,

    /// Limits applied to the active version
    pub limits: Option<FunctionLimits>,

    /// Mapping per input queue for the active version
    pub mappings: BTreeMap<QueueName, MappingId>,

    /// In-flight operation marker
    pub lease: Option<OperationLease>,

    /// Compare-and-set revision, bumped on every write
    pub revision: u64,

    /// Error from the last failed operation, cleared on success
    pub last_error: Option<String>,

    /// Created timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Last updated timestamp
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl FunctionDeployment {
    /// A fresh, never-deployed record
    pub fn new(key: DeploymentKey) -> Self {
        let now = chrono::Utc::now();
        Self {
            function_name: naming::function_name(&key.tenant, &key.processor),
            role_name: naming::role_name(&key.tenant, &key.processor),
            key,
            role_arn: None,
            state: DeploymentState::NotDeployed,
            active_version: None,
            pending_version: None,
            artifact: None,
            code_sha256: None,
            limits: None,
            mappings: BTreeMap::new(),
            lease: None,
            revision: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a live, unexpired lease is held on this record
    pub fn is_leased(&self, now: chrono::DateTime<chrono::Utc>, ttl: Duration) -> bool {
        self.lease.as_ref().is_some_and(|l| !l.is_expired(now, ttl))
    }

    /// Whether the active alias serves a version
    pub fn is_serving(&self) -> bool {
        self.active_version.is_some()
            && !matches!(self.state, DeploymentState::Deleted | DeploymentState::NotDeployed)
    }
}

/// Deployment lifecycle state
///
/// First deploys walk `NotDeployed → RoleProvisioning → CodeUploading →
/// VersionPublishing → EventSourceWiring → Active`. Redeploys of an active
/// pair stay in `Updating` and report their step through `stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeploymentState {
    NotDeployed,
    RoleProvisioning,
    CodeUploading,
    VersionPublishing,
    EventSourceWiring,
    Active,
    Updating { stage: DeployStage },
    TearingDown,
    Deleted,
}

impl DeploymentState {
    /// State to record when a deploy reaches `stage`
    pub fn for_stage(stage: DeployStage, redeploy: bool) -> Self {
        if redeploy {
            return Self::Updating { stage };
        }
        match stage {
            DeployStage::RoleProvisioning => Self::RoleProvisioning,
            DeployStage::CodeUploading => Self::CodeUploading,
            DeployStage::VersionPublishing => Self::VersionPublishing,
            DeployStage::EventSourceWiring => Self::EventSourceWiring,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Deleted | Self::NotDeployed)
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDeployed => f.write_str("NotDeployed"),
            Self::RoleProvisioning => f.write_str("RoleProvisioning"),
            Self::CodeUploading => f.write_str("CodeUploading"),
            Self::VersionPublishing => f.write_str("VersionPublishing"),
            Self::EventSourceWiring => f.write_str("EventSourceWiring"),
            Self::Active => f.write_str("Active"),
            Self::Updating { stage } => write!(f, "Updating({stage:?})"),
            Self::TearingDown => f.write_str("TearingDown"),
            Self::Deleted => f.write_str("Deleted"),
        }
    }
}

/// Deploy steps between `NotDeployed`/`Active` and `Active`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeployStage {
    RoleProvisioning,
    CodeUploading,
    VersionPublishing,
    EventSourceWiring,
}

/// Kind of in-flight operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Deploy,
    Teardown,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploy => f.write_str("deploy"),
            Self::Teardown => f.write_str("teardown"),
        }
    }
}

/// Marker for the operation currently owning a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationLease {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    /// Control-plane instance holding the lease
    pub holder: String,
    pub acquired_at: chrono::DateTime<chrono::Utc>,
}

impl OperationLease {
    pub fn new(kind: OperationKind, holder: impl Into<String>) -> Self {
        Self {
            operation_id: Uuid::new_v4(),
            kind,
            holder: holder.into(),
            acquired_at: chrono::Utc::now(),
        }
    }

    /// A lease older than `ttl` belongs to an instance that stopped mid-operation
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>, ttl: Duration) -> bool {
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - self.acquired_at >= ttl,
            Err(_) => false,
        }
    }
}

/// Limits applied to a published function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLimits {
    pub memory_mb: u32,
    pub timeout_secs: u32,
    pub reserved_concurrency: Option<u32>,
    pub batch_size: u32,
}

/// Per-tenant ceilings on function limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPlan {
    pub name: String,
    pub max_memory_mb: u32,
    pub max_timeout_secs: u32,
    pub max_reserved_concurrency: u32,
    pub max_batch_size: u32,
    pub default_memory_mb: u32,
    pub default_timeout_secs: u32,
    pub default_batch_size: u32,
}

impl Default for TenantPlan {
    fn default() -> Self {
        Self {
            name: "standard".to_string(),
            max_memory_mb: 1024,
            max_timeout_secs: 300,
            max_reserved_concurrency: 10,
            max_batch_size: 100,
            default_memory_mb: 256,
            default_timeout_secs: 30,
            default_batch_size: 10,
        }
    }
}

impl TenantPlan {
    /// Bound requested limits by this plan
    pub fn clamp(&self, requested: &ProcessorLimits) -> FunctionLimits {
        FunctionLimits {
            memory_mb: requested
                .memory_mb
                .unwrap_or(self.default_memory_mb)
                .clamp(128, self.max_memory_mb.max(128)),
            timeout_secs: requested
                .timeout_secs
                .unwrap_or(self.default_timeout_secs)
                .clamp(1, self.max_timeout_secs.max(1)),
            reserved_concurrency: requested
                .reserved_concurrency
                .map(|c| c.min(self.max_reserved_concurrency)),
            batch_size: requested
                .batch_size
                .unwrap_or(self.default_batch_size)
                .clamp(1, self.max_batch_size.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_derives_names() {
        let record = FunctionDeployment::new(DeploymentKey::new("acme", "enricher"));
        assert_eq!(record.state, DeploymentState::NotDeployed);
        assert_eq!(record.revision, 0);
        assert!(record.function_name.as_str().starts_with("cfx-acme-enricher"));
        assert!(!record.is_serving());
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            DeploymentState::for_stage(DeployStage::CodeUploading, false),
            DeploymentState::CodeUploading
        );
        assert_eq!(
            DeploymentState::for_stage(DeployStage::CodeUploading, true),
            DeploymentState::Updating {
                stage: DeployStage::CodeUploading
            }
        );
    }

    #[test]
    fn test_lease_expiry() {
        let mut lease = OperationLease::new(OperationKind::Deploy, "cp-1");
        let ttl = Duration::from_secs(60);
        let now = chrono::Utc::now();
        assert!(!lease.is_expired(now, ttl));

        lease.acquired_at = now - chrono::Duration::seconds(61);
        assert!(lease.is_expired(now, ttl));
    }

    #[test]
    fn test_plan_clamps_requested_limits() {
        let plan = TenantPlan::default();
        let limits = plan.clamp(&ProcessorLimits {
            memory_mb: Some(4096),
            timeout_secs: None,
            reserved_concurrency: Some(50),
            batch_size: Some(0),
        });
        assert_eq!(limits.memory_mb, 1024);
        assert_eq!(limits.timeout_secs, 30);
        assert_eq!(limits.reserved_concurrency, Some(10));
        assert_eq!(limits.batch_size, 1);
    }

    #[test]
    fn test_state_serde_is_tagged() {
        let json = serde_json::to_string(&DeploymentState::Updating {
            stage: DeployStage::EventSourceWiring,
        })
        .unwrap();
        assert!(json.contains("\"state\":\"updating\""));
    }
}
