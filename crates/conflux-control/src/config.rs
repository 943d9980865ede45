//! Control plane configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! file, then `CONFLUX_` environment variables. Nested keys are separated by
//! a double underscore, e.g. `CONFLUX_DEPLOYMENT__LEASE_TTL_SECS=300`.

use conflux_authz::AuthorizerConfig;
use conflux_convergence::WaiterConfig;
use conflux_deployment::ControllerConfig;
use conflux_runtime::SimulationConfig;
use conflux_types::{SubstrateAccount, TenantPlan};
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level control plane configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub substrate: SubstrateConfig,
    pub waiter: WaiterConfig,
    pub deployment: DeploymentSettings,
    pub authorizer: AuthorizerConfig,
    pub logging: LoggingConfig,

    /// Convergence lag of the in-memory substrate
    pub simulation: SimulationConfig,
}

/// Where functions, queues and roles live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubstrateConfig {
    pub partition: String,
    pub region: String,
    pub account_id: String,

    /// Service principal trusted by execution roles
    pub execution_principal: String,

    /// Attach each tenant's permission boundary to its execution roles
    pub permission_boundaries: bool,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        let account = SubstrateAccount::default();
        let controller = ControllerConfig::default();
        Self {
            partition: account.partition,
            region: account.region,
            account_id: account.account_id,
            execution_principal: controller.execution_principal,
            permission_boundaries: controller.permission_boundaries,
        }
    }
}

impl SubstrateConfig {
    pub fn account(&self) -> SubstrateAccount {
        SubstrateAccount {
            partition: self.partition.clone(),
            region: self.region.clone(),
            account_id: self.account_id.clone(),
        }
    }
}

/// Deployment controller settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSettings {
    /// Lease holder identity; generated per process when unset
    pub holder: Option<String>,

    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    #[serde(default = "default_alias_name")]
    pub alias_name: String,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Plan for tenants the catalog has no plan for
    pub default_plan: TenantPlan,
}

impl Default for DeploymentSettings {
    fn default() -> Self {
        Self {
            holder: None,
            lease_ttl_secs: default_lease_ttl_secs(),
            alias_name: default_alias_name(),
            event_capacity: default_event_capacity(),
            default_plan: TenantPlan::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_lease_ttl_secs() -> u64 {
    15 * 60
}

fn default_alias_name() -> String {
    "active".to_string()
}

fn default_event_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ControlPlaneConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Self::defaults()?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(config::Config::builder().add_source(config::Config::try_from(&Self::default())?))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .add_source(
                config::Environment::with_prefix("CONFLUX")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()
            .and_then(|config| config.validate().map(|()| config))
    }

    /// Reject settings the control plane cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.waiter
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))
    }

    /// Settings for the deployment controller
    pub fn controller_config(&self) -> ControllerConfig {
        let mut controller = ControllerConfig::default()
            .with_lease_ttl(Duration::from_secs(self.deployment.lease_ttl_secs))
            .with_waiter(self.waiter.clone())
            .with_account(self.substrate.account());
        if let Some(holder) = &self.deployment.holder {
            controller = controller.with_holder(holder.clone());
        }
        controller.alias_name = self.deployment.alias_name.clone();
        controller.event_capacity = self.deployment.event_capacity;
        controller.execution_principal = self.substrate.execution_principal.clone();
        controller.permission_boundaries = self.substrate.permission_boundaries;
        controller
    }

    /// Local development: every write is visible on the next read
    pub fn development() -> Self {
        Self {
            simulation: SimulationConfig::instant(),
            waiter: WaiterConfig::immediate(),
            ..Default::default()
        }
    }
}
