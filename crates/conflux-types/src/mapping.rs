//! Event-source mapping types
//!
//! A mapping delivers messages from one queue to one published function
//! version. Mappings move through transient states on the substrate; the
//! control plane only ever reports a mapping after it has settled.

use crate::ids::{FunctionName, MappingId, QueueName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event-source mapping as described by the function runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourceMapping {
    /// Substrate-issued identifier
    pub id: MappingId,

    /// Source queue (tenant-local name)
    pub queue: QueueName,

    /// Source queue ARN
    pub source_arn: String,

    /// Target function and version
    pub target: FunctionTarget,

    /// Maximum records per invocation
    pub batch_size: u32,

    /// Current lifecycle state
    pub state: MappingState,

    /// Last modification timestamp
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

/// A function qualified by a published version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionTarget {
    pub function: FunctionName,
    pub version: String,
}

impl FunctionTarget {
    pub fn new(function: FunctionName, version: impl Into<String>) -> Self {
        Self {
            function,
            version: version.into(),
        }
    }
}

impl fmt::Display for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.function, self.version)
    }
}

/// Mapping lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingState {
    Creating,
    Enabling,
    Enabled,
    Updating,
    Disabling,
    Disabled,
    Deleting,
}

impl MappingState {
    /// States the substrate moves out of on its own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::Enabling | Self::Updating | Self::Disabling | Self::Deleting
        )
    }

    /// Settled states a caller may act on
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Enabled | Self::Disabled)
    }
}

impl fmt::Display for MappingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Creating => "Creating",
            Self::Enabling => "Enabling",
            Self::Enabled => "Enabled",
            Self::Updating => "Updating",
            Self::Disabling => "Disabling",
            Self::Disabled => "Disabled",
            Self::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_and_settled_partition_states() {
        let all = [
            MappingState::Creating,
            MappingState::Enabling,
            MappingState::Enabled,
            MappingState::Updating,
            MappingState::Disabling,
            MappingState::Disabled,
            MappingState::Deleting,
        ];
        for state in all {
            assert_ne!(state.is_transient(), state.is_settled(), "{state}");
        }
    }
}
