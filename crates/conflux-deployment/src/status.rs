//! Deployment status reporting

use conflux_runtime::FunctionAlias;
use conflux_types::{EventSourceMapping, FunctionDeployment, MappingState, QueueName};
use serde::{Deserialize, Serialize};

/// Persisted record plus what the substrate currently reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub record: FunctionDeployment,

    /// The live alias, if the function has one
    pub alias: Option<FunctionAlias>,

    /// Live mappings for every version of the function
    pub mappings: Vec<EventSourceMapping>,
}

impl DeploymentStatus {
    /// An operation currently holds the record
    pub fn in_flight(&self) -> bool {
        self.record.lease.is_some()
    }

    /// Live mapping of `queue` for the version the alias serves
    pub fn serving_mapping(&self, queue: &QueueName) -> Option<&EventSourceMapping> {
        let version = self.alias.as_ref()?.version.as_str();
        self.mappings
            .iter()
            .find(|m| &m.queue == queue && m.target.version == version)
    }

    /// Every declared input of the serving version has an enabled mapping
    pub fn is_fully_wired(&self) -> bool {
        self.alias.is_some()
            && self.record.mappings.keys().all(|queue| {
                self.serving_mapping(queue)
                    .is_some_and(|m| m.state == MappingState::Enabled)
            })
    }
}
