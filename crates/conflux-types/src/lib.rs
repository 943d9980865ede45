//! Conflux Types - Core data model for the stream-processing control plane
//!
//! Conflux lets tenants declare processors that consume from and produce to
//! named queues. The control plane provisions an isolated execution role per
//! processor, deploys its code as a managed function and wires queue-to-function
//! routing on an eventually-consistent substrate.
//!
//! ## Key Concepts
//!
//! - **Tenant**: the unit of isolation; owns processors, queues and API access
//! - **Processor**: tenant code with declared input and output queues
//! - **FunctionDeployment**: the persisted deployment record for one processor
//! - **EventSourceMapping**: the binding of a queue to a function version
//! - **PolicyDocument**: allow/deny statements shared by roles and the authorizer
//! - **ApiAccess**: platform-issued credentials and their scope

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod access;
pub mod deployment;
pub mod error;
pub mod events;
pub mod ids;
pub mod mapping;
pub mod naming;
pub mod policy;
pub mod processor;
pub mod role;

// Re-export main types
pub use access::{ApiAccess, CredentialOwner};
pub use deployment::{
    DeployStage, DeploymentKey, DeploymentState, FunctionDeployment, FunctionLimits,
    OperationKind, OperationLease, TenantPlan,
};
pub use error::{ErrorKind, IdentifierError};
pub use events::{DeploymentEvent, DeploymentEventEnvelope, EventSeverity};
pub use ids::{FunctionName, MappingId, ProcessorName, QueueName, RoleName, TenantId};
pub use mapping::{EventSourceMapping, FunctionTarget, MappingState};
pub use naming::SubstrateAccount;
pub use policy::{Effect, PolicyDocument, PolicyStatement, Principal};
pub use processor::{CodeArtifactRef, Processor, ProcessorLimits, QueueRef};
pub use role::IamRole;
