//! Conflux Deployment - Deploy lifecycle of processor functions
//!
//! The [`DeploymentController`] turns a declared processor and a code
//! artifact into a live function wired to its input queues:
//!
//! 1. Validate identifiers and reject cyclic topologies, with no side effects
//! 2. Take the lease on the (tenant, processor) record
//! 3. Provision the execution role and its least-privilege policy
//! 4. Upload code, apply limits and publish an immutable version
//! 5. Bring up mappings for the new version next to the serving ones
//! 6. Repoint the `active` alias, then retire the previous mappings
//!
//! Each step discovers what an earlier, failed attempt left behind and
//! reuses it, so retrying a failed deploy never duplicates resources. Until
//! step 6 the previous version keeps consuming from every input queue.
//!
//! ## Example
//!
//! ```ignore
//! let controller = DeploymentController::new(ctx, ControllerConfig::default());
//! let mut events = controller.subscribe();
//!
//! let record = controller.deploy(&tenant, &processor, &artifact).await?;
//! assert_eq!(record.state, DeploymentState::Active);
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod config;
mod context;
mod controller;
mod error;
mod operation;
mod state;
mod status;
mod wiring;

pub use config::ControllerConfig;
pub use context::DeploymentContext;
pub use controller::DeploymentController;
pub use error::{DeploymentError, Result};
pub use state::{DeploymentStateStore, InMemoryDeploymentStateStore, StateStoreError};
pub use status::DeploymentStatus;
