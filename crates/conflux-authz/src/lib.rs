//! Conflux Authz - Request-time authorization policies
//!
//! The data-plane gateway hands every request's credential to
//! [`AuthorizationPolicyGenerator::authorize`] and enforces the returned
//! [`AccessPolicy`].
//!
//! ## Credentials
//!
//! - `Bearer <token>`: verified by the [`IdentityProvider`]; the token's
//!   groups are the caller's organizations
//! - anything else: a platform-issued API key looked up in the
//!   [`ApiAccessStore`]; its tenant is the caller's only organization and
//!   its queue whitelist, if any, narrows what it may target
//!
//! A credential that cannot be resolved yields
//! [`AuthorizerError::Unauthorized`], which the gateway answers with 401.
//! Failures of the identity provider or the key table are
//! [`AuthorizerError::Backend`].
//!
//! ## Policy shape
//!
//! Every platform path is allowed, then the organization-scoped ingest paths
//! (`{root}/organization/{org}/target/{queue}`) are denied except for the
//! caller's own. Organization and queue names are reduced to
//! `[A-Za-z0-9_.-]` before they are embedded, so a crafted name cannot
//! widen a pattern.
//!
//! [`IdentityProvider`]: conflux_runtime::IdentityProvider
//! [`ApiAccessStore`]: conflux_runtime::ApiAccessStore

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

mod config;
mod credential;
mod error;
mod generator;
mod jwt;
mod policy;

pub use config::{AuthorizerConfig, JwtAlgorithm, JwtSettings};
pub use credential::Credential;
pub use error::AuthorizerError;
pub use generator::AuthorizationPolicyGenerator;
pub use jwt::JwtIdentityProvider;
pub use policy::{allowed_patterns, build_policy, sanitize_segment, AccessPolicy, CallerScope};
