//! Authorization Policy Generator - Credential to access policy
//!
//! Runs on every data-plane request. It never calls the function runtime or
//! the role store; only the identity provider or the API access store is
//! consulted, depending on the credential.

use crate::config::AuthorizerConfig;
use crate::credential::Credential;
use crate::error::AuthorizerError;
use crate::policy::{build_policy, AccessPolicy, CallerScope};
use conflux_runtime::{ApiAccessStore, IdentityProvider};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Turns request credentials into scoped access policies
pub struct AuthorizationPolicyGenerator {
    identity: Arc<dyn IdentityProvider>,
    access: Arc<dyn ApiAccessStore>,
    config: AuthorizerConfig,
}

impl AuthorizationPolicyGenerator {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        access: Arc<dyn ApiAccessStore>,
        config: AuthorizerConfig,
    ) -> Self {
        Self {
            identity,
            access,
            config,
        }
    }

    pub fn config(&self) -> &AuthorizerConfig {
        &self.config
    }

    /// Authorize a raw credential value such as an `Authorization` header
    #[instrument(skip_all)]
    pub async fn authorize(&self, raw_credential: &str) -> Result<AccessPolicy, AuthorizerError> {
        let credential = Credential::classify(raw_credential)?;
        let scope = match self.resolve(&credential).await {
            Ok(scope) => scope,
            Err(err) => {
                match &err {
                    AuthorizerError::Unauthorized(reason) => {
                        debug!(credential = credential.kind(), reason = %reason, "Unauthorized")
                    }
                    AuthorizerError::Backend(reason) => {
                        warn!(credential = credential.kind(), reason = %reason, "Authorizer backend failed")
                    }
                }
                return Err(err);
            }
        };

        debug!(
            credential = credential.kind(),
            principal = %scope.username,
            organizations = scope.organizations.len(),
            whitelisted = scope.queue_whitelist.len(),
            "Authorized"
        );
        Ok(self.policy_for(&scope))
    }

    /// Resolve a credential to the caller it identifies
    pub async fn resolve(&self, credential: &Credential) -> Result<CallerScope, AuthorizerError> {
        match credential {
            Credential::Bearer(token) => {
                let claims = self.identity.verify(token).await?;
                Ok(CallerScope::new(claims.username, claims.groups))
            }
            Credential::ApiKey(key) => {
                let access = self
                    .access
                    .get(key)
                    .await?
                    .ok_or_else(|| AuthorizerError::Unauthorized("unknown API key".to_string()))?;

                let mut scope = CallerScope::new(
                    access.owner.principal_name(),
                    [access.tenant.as_str().to_string()],
                )
                .with_whitelist(access.queue_whitelist);
                scope.usage_plan = access.usage_plan;
                scope.owner_kind = Some(access.owner.kind().to_string());
                Ok(scope)
            }
        }
    }

    /// Policy for an already resolved caller
    pub fn policy_for(&self, scope: &CallerScope) -> AccessPolicy {
        build_policy(&self.config.resource_root, &self.config.action, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_runtime::{
        IdentityClaims, InMemoryApiAccessStore, RuntimeError, StaticIdentityProvider,
    };
    use conflux_types::ApiAccess;

    struct Fixture {
        identity: Arc<StaticIdentityProvider>,
        access: Arc<InMemoryApiAccessStore>,
        generator: AuthorizationPolicyGenerator,
    }

    fn fixture() -> Fixture {
        let identity = Arc::new(StaticIdentityProvider::new());
        let access = Arc::new(InMemoryApiAccessStore::new());
        let generator = AuthorizationPolicyGenerator::new(
            identity.clone(),
            access.clone(),
            AuthorizerConfig::default(),
        );
        Fixture {
            identity,
            access,
            generator,
        }
    }

    #[tokio::test]
    async fn bearer_token_scopes_to_group_organizations() {
        let f = fixture();
        f.identity
            .register("tok-alice", IdentityClaims::new("alice", ["acme"]));

        let policy = f.generator.authorize("Bearer tok-alice").await.unwrap();
        assert_eq!(policy.principal_id, "alice");
        assert_eq!(policy.context["organizations"], "acme");
        assert!(!policy.context.contains_key("owner_kind"));
        assert!(policy.is_allowed("/organization/acme/target/q1"));
        assert!(!policy.is_allowed("/organization/other/target/q1"));
    }

    #[tokio::test]
    async fn api_key_scopes_to_owner_tenant_and_whitelist() {
        let f = fixture();
        f.access.insert(
            ApiAccess::for_processor("k-1", "acme", "enricher")
                .with_whitelist(["q1"])
                .with_usage_plan("plan-basic"),
        );

        let policy = f.generator.authorize("k-1").await.unwrap();
        assert_eq!(policy.principal_id, "processor:enricher");
        assert_eq!(policy.context["owner_kind"], "processor_task");
        assert_eq!(policy.usage_identifier_key.as_deref(), Some("plan-basic"));
        assert!(policy.is_allowed("/organization/acme/target/q1/messages"));
        assert!(!policy.is_allowed("/organization/acme/target/q2/messages"));
        assert!(!policy.is_allowed("/organization/other/target/q1/messages"));
    }

    #[tokio::test]
    async fn unknown_or_invalid_credentials_are_unauthorized() {
        let f = fixture();

        let err = f.generator.authorize("k-missing").await.unwrap_err();
        assert!(err.is_unauthorized());

        let err = f.generator.authorize("Bearer forged").await.unwrap_err();
        assert!(err.is_unauthorized());

        let err = f.generator.authorize("").await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn backend_failures_are_not_unauthorized() {
        let f = fixture();
        f.access
            .hooks()
            .fail_next("get", RuntimeError::Unavailable("table offline".into()));

        let err = f.generator.authorize("k-1").await.unwrap_err();
        assert!(matches!(err, AuthorizerError::Backend(_)));
    }

    #[tokio::test]
    async fn revoked_key_is_unauthorized() {
        let f = fixture();
        f.access.insert(ApiAccess::for_user("k-2", "acme", "alice"));
        assert!(f.generator.authorize("k-2").await.is_ok());

        f.access.revoke("k-2");
        assert!(f.generator.authorize("k-2").await.unwrap_err().is_unauthorized());
    }
}
