//! Deterministic resource naming
//!
//! Every substrate resource owned by a (tenant, processor) pair has a name
//! derived only from that pair, so a retried operation always addresses the
//! same function, role and queues. Names are restricted to `[A-Za-z0-9_-]`
//! and carry a short digest of the unsanitized pair, which keeps pairs such as
//! `("a-b", "c")` and `("a", "b-c")` distinct.

use crate::ids::{FunctionName, ProcessorName, QueueName, RoleName, TenantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum length of function and role names on the substrate
pub const MAX_RESOURCE_NAME_LEN: usize = 64;

const NAME_PREFIX: &str = "cfx";
const ROLE_SUFFIX: &str = "-exec";
const DIGEST_HEX_LEN: usize = 8;

/// Account coordinates used to build resource ARNs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstrateAccount {
    /// ARN partition
    pub partition: String,
    /// Region
    pub region: String,
    /// Account identifier
    pub account_id: String,
}

impl Default for SubstrateAccount {
    fn default() -> Self {
        Self {
            partition: "aws".to_string(),
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
        }
    }
}

impl SubstrateAccount {
    pub fn queue_arn(&self, tenant: &TenantId, queue: &QueueName) -> String {
        format!(
            "arn:{}:sqs:{}:{}:{}",
            self.partition,
            self.region,
            self.account_id,
            queue_resource_name(tenant, queue)
        )
    }

    pub fn role_arn(&self, role: &RoleName) -> String {
        format!("arn:{}:iam::{}:role/{}", self.partition, self.account_id, role)
    }

    pub fn policy_arn(&self, policy_name: &str) -> String {
        format!(
            "arn:{}:iam::{}:policy/{}",
            self.partition, self.account_id, policy_name
        )
    }

    pub fn function_arn(&self, function: &FunctionName, qualifier: Option<&str>) -> String {
        let base = format!(
            "arn:{}:lambda:{}:{}:function:{}",
            self.partition, self.region, self.account_id, function
        );
        match qualifier {
            Some(q) => format!("{base}:{q}"),
            None => base,
        }
    }

    pub fn log_group_arn(&self, function: &FunctionName) -> String {
        format!(
            "arn:{}:logs:{}:{}:log-group:/aws/lambda/{}:*",
            self.partition, self.region, self.account_id, function
        )
    }
}

/// Managed-function name for a processor
pub fn function_name(tenant: &TenantId, processor: &ProcessorName) -> FunctionName {
    FunctionName::new(scoped_name(tenant.as_str(), processor.as_str(), ""))
}

/// Execution-role name for a processor
pub fn role_name(tenant: &TenantId, processor: &ProcessorName) -> RoleName {
    RoleName::new(scoped_name(tenant.as_str(), processor.as_str(), ROLE_SUFFIX))
}

/// Physical queue name for a tenant queue
pub fn queue_resource_name(tenant: &TenantId, queue: &QueueName) -> String {
    scoped_name(tenant.as_str(), queue.as_str(), "")
}

/// Permission boundary policy name for a tenant
///
/// One boundary per tenant caps everything any of its processor roles can be
/// granted.
pub fn permission_boundary_name(tenant: &TenantId) -> String {
    format!("{NAME_PREFIX}-{}-boundary", sanitize(tenant.as_str()))
}

fn scoped_name(owner: &str, name: &str, suffix: &str) -> String {
    let digest = Sha256::digest(format!("{owner}/{name}").as_bytes());
    let digest_hex: String = digest
        .iter()
        .take(DIGEST_HEX_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect();

    let tail = format!("-{digest_hex}{suffix}");
    let mut body = sanitize(&format!("{NAME_PREFIX}-{owner}-{name}"));
    body.truncate(MAX_RESOURCE_NAME_LEN - tail.len());
    format!("{body}{tail}")
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_deterministic() {
        let t = TenantId::new("acme");
        let p = ProcessorName::new("enricher");
        assert_eq!(function_name(&t, &p), function_name(&t, &p));
        assert_eq!(role_name(&t, &p), role_name(&t, &p));
        assert!(function_name(&t, &p).as_str().starts_with("cfx-acme-enricher-"));
        assert!(role_name(&t, &p).as_str().ends_with("-exec"));
    }

    #[test]
    fn test_ambiguous_pairs_do_not_collide() {
        let a = function_name(&TenantId::new("a-b"), &ProcessorName::new("c"));
        let b = function_name(&TenantId::new("a"), &ProcessorName::new("b-c"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_names_fit_substrate_limit() {
        let t = TenantId::new("t".repeat(63));
        let p = ProcessorName::new("p".repeat(63));
        let function = function_name(&t, &p);
        let role = role_name(&t, &p);
        assert_eq!(function.as_str().len(), MAX_RESOURCE_NAME_LEN);
        assert_eq!(role.as_str().len(), MAX_RESOURCE_NAME_LEN);
        assert!(role.as_str().ends_with("-exec"));
    }

    #[test]
    fn test_dots_are_replaced() {
        let name = function_name(&TenantId::new("acme"), &ProcessorName::new("orders.v2"));
        assert!(!name.as_str().contains('.'));
    }

    #[test]
    fn test_arns() {
        let account = SubstrateAccount::default();
        let f = FunctionName::new("cfx-acme-enricher-00000000");
        assert_eq!(
            account.function_arn(&f, Some("7")),
            "arn:aws:lambda:us-east-1:000000000000:function:cfx-acme-enricher-00000000:7"
        );
        assert!(account
            .queue_arn(&TenantId::new("acme"), &QueueName::new("orders"))
            .starts_with("arn:aws:sqs:us-east-1:000000000000:cfx-acme-orders-"));
    }
}
