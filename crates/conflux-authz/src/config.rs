//! Authorizer configuration

use serde::{Deserialize, Serialize};

/// Settings for an [`crate::AuthorizationPolicyGenerator`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizerConfig {
    /// Prefix of every platform resource path, e.g. the API ARN and stage.
    /// `*` matches any prefix.
    pub resource_root: String,

    /// Action named in generated statements
    pub action: String,

    /// Bearer token verification; tokens are rejected when unset
    pub jwt: Option<JwtSettings>,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            resource_root: "*".to_string(),
            action: "execute-api:Invoke".to_string(),
            jwt: None,
        }
    }
}

impl AuthorizerConfig {
    pub fn with_resource_root(mut self, root: impl Into<String>) -> Self {
        self.resource_root = root.into();
        self
    }
}

/// Signing algorithm accepted for bearer tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    Hs256,
    Rs256,
}

/// Bearer token verification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtSettings {
    pub algorithm: JwtAlgorithm,

    /// Shared secret for HS256
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM-encoded public key for RS256
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Required `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,

    /// Accepted `aud` claims
    #[serde(default)]
    pub audience: Vec<String>,

    /// Allowed clock skew in seconds
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

fn default_leeway() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_any_root() {
        let config = AuthorizerConfig::default();
        assert_eq!(config.resource_root, "*");
        assert!(config.jwt.is_none());
    }

    #[test]
    fn jwt_settings_deserialize() {
        let config: AuthorizerConfig = serde_json::from_str(
            r#"{"jwt": {"algorithm": "HS256", "secret": "s", "issuer": "https://idp"}}"#,
        )
        .unwrap();
        let jwt = config.jwt.unwrap();
        assert_eq!(jwt.algorithm, JwtAlgorithm::Hs256);
        assert_eq!(jwt.leeway_secs, 60);
        assert!(jwt.audience.is_empty());
    }
}
