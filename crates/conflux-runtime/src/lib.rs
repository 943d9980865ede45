//! Conflux Runtime - Outbound collaborator interfaces
//!
//! The control plane talks to the cloud substrate only through the traits in
//! this crate:
//!
//! - **CodeArtifactStore**: immutable, content-addressed processor code
//! - **IdentityProvider**: bearer-token verification
//! - **MessageQueueService**: tenant queues and consume grants
//! - **FunctionRuntime**: functions, versions, aliases and event-source mappings
//! - **RoleAndPolicyStore**: execution roles and inline policies
//! - **ProcessorCatalog** / **ApiAccessStore**: what tenants have declared
//!
//! Every substrate call is asynchronous and eventually consistent; callers
//! observe progress by reading again.
//!
//! ## In-Memory Substrate
//!
//! [`memory`] implements every trait in process with configurable
//! read-after-write lag, transient mapping states and failure injection.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod artifact;
pub mod catalog;
pub mod error;
pub mod function;
pub mod iam;
pub mod identity;
pub mod memory;
pub mod queue;

// Re-exports
pub use artifact::{CodeArtifact, CodeArtifactStore};
pub use catalog::{ApiAccessStore, ProcessorCatalog};
pub use error::{Result, RuntimeError};
pub use function::{
    CreateFunctionRequest, CreateMappingRequest, FunctionAlias, FunctionConfiguration,
    FunctionRuntime, FunctionState, FunctionVersion, LastUpdateStatus, UpdateMappingRequest,
};
pub use iam::{CreateRoleRequest, RoleAndPolicyStore};
pub use identity::{IdentityClaims, IdentityProvider};
pub use memory::{
    InMemoryApiAccessStore, InMemoryArtifactStore, InMemoryFunctionRuntime,
    InMemoryProcessorCatalog, InMemoryQueueService, InMemoryRoleStore, OperationHooks,
    SimulationConfig, StaticIdentityProvider,
};
pub use queue::{MessageQueueService, QueueDescription};
