//! Deployment lifecycle events
//!
//! Events give observers a stream of what the controller did. They are
//! advisory: nothing reads them back to make decisions.

use crate::deployment::{DeploymentKey, DeploymentState, OperationKind};
use crate::ids::{MappingId, QueueName};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping every deployment event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentEventEnvelope {
    /// Unique event ID
    pub id: Uuid,

    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Event severity
    pub severity: EventSeverity,

    /// Operation that produced the event
    pub operation_id: Option<Uuid>,

    /// The actual event
    pub event: DeploymentEvent,
}

impl DeploymentEventEnvelope {
    pub fn new(event: DeploymentEvent, operation_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
            severity: event.severity(),
            operation_id,
            event,
        }
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Deployment events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeploymentEvent {
    OperationStarted {
        key: DeploymentKey,
        kind: OperationKind,
    },

    /// Rejected before any side effect
    OperationRejected {
        key: DeploymentKey,
        reason: String,
    },

    StateChanged {
        key: DeploymentKey,
        state: DeploymentState,
    },

    VersionPublished {
        key: DeploymentKey,
        version: String,
        code_sha256: String,
    },

    MappingConverged {
        key: DeploymentKey,
        queue: QueueName,
        mapping_id: MappingId,
    },

    AliasRepointed {
        key: DeploymentKey,
        from: Option<String>,
        to: String,
    },

    MappingRetired {
        key: DeploymentKey,
        queue: QueueName,
        mapping_id: MappingId,
    },

    DeploymentActivated {
        key: DeploymentKey,
        version: String,
        duration_ms: u64,
    },

    OperationFailed {
        key: DeploymentKey,
        kind: OperationKind,
        reason: String,
        retryable: bool,
    },

    TeardownCompleted {
        key: DeploymentKey,
    },
}

impl DeploymentEvent {
    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::OperationRejected { .. } => EventSeverity::Warning,
            Self::OperationFailed { .. } => EventSeverity::Error,
            _ => EventSeverity::Info,
        }
    }

    pub fn key(&self) -> &DeploymentKey {
        match self {
            Self::OperationStarted { key, .. }
            | Self::OperationRejected { key, .. }
            | Self::StateChanged { key, .. }
            | Self::VersionPublished { key, .. }
            | Self::MappingConverged { key, .. }
            | Self::AliasRepointed { key, .. }
            | Self::MappingRetired { key, .. }
            | Self::DeploymentActivated { key, .. }
            | Self::OperationFailed { key, .. }
            | Self::TeardownCompleted { key } => key,
        }
    }
}
