//! Conflux Roles - Execution roles for processors
//!
//! Every deployed processor runs under its own role. [`RoleProvisioner`]
//! creates that role with a permission boundary and a trust policy that
//! admits only the platform's execution principal, then attaches the
//! least-privilege inline policy computed by [`processor_access_policy`].
//!
//! Both operations are idempotent under retry and under concurrent calls
//! from other control-plane instances. Only eventual-consistency delay is
//! waited out; permission and provisioning failures from the identity
//! service are returned unchanged.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod error;
mod policy;
mod provisioner;

pub use error::RoleError;
pub use policy::{
    execution_trust_policy, processor_access_policy, tenant_boundary_arn, ACCESS_POLICY_NAME,
    DEFAULT_EXECUTION_PRINCIPAL,
};
pub use provisioner::RoleProvisioner;
