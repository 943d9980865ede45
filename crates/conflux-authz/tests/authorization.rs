use conflux_authz::{AuthorizationPolicyGenerator, AuthorizerConfig, JwtIdentityProvider};
use conflux_runtime::InMemoryApiAccessStore;
use conflux_types::{ApiAccess, Effect};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::sync::Arc;

const SECRET: &[u8] = b"integration-secret";

fn generator(access: Arc<InMemoryApiAccessStore>) -> AuthorizationPolicyGenerator {
    let identity = JwtIdentityProvider::hs256(SECRET).with_issuer("https://idp.example");
    AuthorizationPolicyGenerator::new(Arc::new(identity), access, AuthorizerConfig::default())
}

fn bearer(username: &str, groups: &[&str]) -> String {
    let claims = json!({
        "cognito:username": username,
        "cognito:groups": groups,
        "iss": "https://idp.example",
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("token should encode");
    format!("Bearer {token}")
}

#[tokio::test]
async fn member_of_acme_without_whitelist() {
    let authz = generator(Arc::new(InMemoryApiAccessStore::new()));
    let policy = authz
        .authorize(&bearer("alice", &["acme"]))
        .await
        .expect("valid token");

    assert_eq!(policy.evaluate("/organization/acme/target/orders"), Effect::Allow);
    assert_eq!(policy.evaluate("/organization/acme/anything"), Effect::Allow);
    assert_eq!(policy.evaluate("/organization/other/target/orders"), Effect::Deny);
    assert_eq!(
        policy.evaluate("/organization/other/target/q1/organization/acme/x"),
        Effect::Deny
    );
}

#[tokio::test]
async fn api_key_whitelist_limits_queues() {
    let access = Arc::new(InMemoryApiAccessStore::new());
    access.insert(ApiAccess::for_user("key-1", "acme", "ingest-bot").with_whitelist(["q1"]));
    let authz = generator(access);

    let policy = authz.authorize("key-1").await.expect("known key");
    assert_eq!(policy.evaluate("/organization/acme/target/q1/batch"), Effect::Allow);
    assert_eq!(policy.evaluate("/organization/acme/target/q2/batch"), Effect::Deny);
}

#[tokio::test]
async fn crafted_organization_names_cannot_widen_access() {
    let authz = generator(Arc::new(InMemoryApiAccessStore::new()));

    for crafted in ["*", "acme/*", "*/organization/*", "ac*"] {
        let policy = authz
            .authorize(&bearer("mallory", &[crafted]))
            .await
            .expect("valid token");
        assert_eq!(
            policy.evaluate("/organization/victim/target/q1"),
            Effect::Deny,
            "{crafted} must not reach another organization"
        );
        for pattern in &policy.document.statements[1].not_resources {
            let tail = pattern.trim_start_matches("*/organization/");
            assert!(!tail.trim_end_matches("/*").contains('*'), "{pattern}");
            assert!(!tail.trim_end_matches("/*").contains('/'), "{pattern}");
        }
    }
}

#[tokio::test]
async fn tokens_with_the_wrong_issuer_are_unauthorized() {
    let authz = generator(Arc::new(InMemoryApiAccessStore::new()));
    let claims = json!({
        "sub": "eve",
        "iss": "https://evil.example",
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("token should encode");

    let err = authz
        .authorize(&format!("Bearer {token}"))
        .await
        .expect_err("issuer must match");
    assert!(err.is_unauthorized());
}
