//! Conflux Control - Unified control plane facade
//!
//! This crate provides the single entry point for Conflux:
//!
//! - **Deployment**: deploy, redeploy, teardown and status of tenant processors
//! - **Authorization**: access policies for data-plane requests
//! - **Events**: a broadcast stream of deployment lifecycle events
//!
//! ## Overview
//!
//! The [`ControlPlane`] composes the deployment controller and the
//! authorization policy generator over one set of [`ServiceHandles`]. It is
//! assembled by [`ControlPlaneBuilder`] from a [`ControlPlaneConfig`], which
//! is loaded from defaults, an optional file and `CONFLUX_` environment
//! variables.
//!
//! ## Key Components
//!
//! - [`ControlPlane`]: deploy / teardown / status / authorize
//! - [`ControlPlaneBuilder`]: wiring from configuration
//! - [`ServiceHandles`]: outbound collaborators
//! - [`InMemorySubstrate`]: simulated collaborators for tests and local use
//! - [`init_tracing`]: `tracing-subscriber` setup honoring `RUST_LOG`
//!
//! ## Example
//!
//! ```rust,ignore
//! use conflux_control::{init_tracing, ControlPlaneBuilder, ControlPlaneConfig};
//!
//! let config = ControlPlaneConfig::load(Some("conflux.toml"))?;
//! init_tracing(&config.logging)?;
//!
//! let (builder, substrate) = ControlPlaneBuilder::new(config).with_in_memory_substrate();
//! let plane = builder.build()?;
//!
//! let record = plane.deploy(&tenant, &processor, &artifact).await?;
//! let policy = plane.authorize("Bearer eyJ...").await?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod builder;
pub mod config;
pub mod control_plane;
pub mod error;
pub mod handles;
pub mod telemetry;

// Re-exports
pub use builder::ControlPlaneBuilder;
pub use config::{ControlPlaneConfig, DeploymentSettings, LoggingConfig, SubstrateConfig};
pub use control_plane::ControlPlane;
pub use error::{ControlPlaneError, Result};
pub use handles::{InMemorySubstrate, ServiceHandles};
pub use telemetry::init_tracing;
