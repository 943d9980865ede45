//! In-memory implementations of the collaborator traits
//!
//! They behave like the real substrate where it matters to the control
//! plane: writes take effect only after a configurable number of reads,
//! mappings move through transient states, and any operation can be made to
//! fail. Used by tests and local development.

mod artifact;
mod catalog;
mod function;
mod hooks;
mod iam;
mod queue;

pub use artifact::InMemoryArtifactStore;
pub use catalog::{InMemoryApiAccessStore, InMemoryProcessorCatalog, StaticIdentityProvider};
pub use function::InMemoryFunctionRuntime;
pub use hooks::OperationHooks;
pub use iam::InMemoryRoleStore;
pub use queue::InMemoryQueueService;

use serde::{Deserialize, Serialize};

/// How slowly the simulated substrate converges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Reads that miss a newly created role or a newly put policy
    pub visibility_reads: u32,

    /// Reads that observe a function create or update still in progress
    pub function_settle_reads: u32,

    /// Reads that observe a mapping in a transient state
    pub mapping_transition_reads: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            visibility_reads: 1,
            function_settle_reads: 1,
            mapping_transition_reads: 1,
        }
    }
}

impl SimulationConfig {
    /// Every write is visible on the next read
    pub fn instant() -> Self {
        Self {
            visibility_reads: 0,
            function_settle_reads: 0,
            mapping_transition_reads: 0,
        }
    }
}
