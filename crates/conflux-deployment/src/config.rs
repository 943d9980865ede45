//! Controller configuration

use conflux_convergence::WaiterConfig;
use conflux_roles::DEFAULT_EXECUTION_PRINCIPAL;
use conflux_types::SubstrateAccount;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for a [`crate::DeploymentController`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Identity recorded in leases taken by this instance
    pub holder: String,

    /// Age after which a lease is considered abandoned
    #[serde(with = "duration_secs")]
    pub lease_ttl: Duration,

    /// Alias that routes traffic to the live version
    pub alias_name: String,

    /// Account coordinates for ARNs
    pub account: SubstrateAccount,

    /// Service principal trusted by execution roles
    pub execution_principal: String,

    /// Attach the tenant's permission boundary to execution roles
    pub permission_boundaries: bool,

    /// Backoff and deadline for every convergence wait
    pub waiter: WaiterConfig,

    /// Capacity of the lifecycle event channel
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            holder: format!("conflux-{}", uuid::Uuid::new_v4()),
            lease_ttl: Duration::from_secs(15 * 60),
            alias_name: "active".to_string(),
            account: SubstrateAccount::default(),
            execution_principal: DEFAULT_EXECUTION_PRINCIPAL.to_string(),
            permission_boundaries: true,
            waiter: WaiterConfig::default(),
            event_capacity: 1024,
        }
    }
}

impl ControllerConfig {
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    pub fn with_waiter(mut self, waiter: WaiterConfig) -> Self {
        self.waiter = waiter;
        self
    }

    pub fn with_account(mut self, account: SubstrateAccount) -> Self {
        self.account = account;
        self
    }
}

/// Serde helper for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.lease_ttl, Duration::from_secs(900));
        assert_eq!(config.alias_name, "active");
        assert!(config.holder.starts_with("conflux-"));
    }

    #[test]
    fn test_deserialize_lease_ttl_in_seconds() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"lease_ttl": 60, "alias_name": "live"}"#).unwrap();
        assert_eq!(config.lease_ttl, Duration::from_secs(60));
        assert_eq!(config.alias_name, "live");
        assert_eq!(config.waiter, WaiterConfig::default());
    }
}
