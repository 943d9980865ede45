//! Bearer token verification with `jsonwebtoken`

use crate::config::{JwtAlgorithm, JwtSettings};
use crate::error::AuthorizerError;
use async_trait::async_trait;
use conflux_runtime::{IdentityClaims, IdentityProvider, RuntimeError};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Claims tried, in order, for the caller's username
const USERNAME_CLAIMS: &[&str] = &["cognito:username", "username", "sub"];

/// Claims tried, in order, for the caller's organizations
const GROUP_CLAIMS: &[&str] = &["cognito:groups", "groups"];

/// Identity provider verifying signed JWTs
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Verify HS256 tokens signed with `secret`
    pub fn hs256(secret: &[u8]) -> Self {
        Self {
            key: DecodingKey::from_secret(secret),
            validation: validation(Algorithm::HS256),
        }
    }

    /// Verify RS256 tokens against a PEM-encoded public key
    pub fn rs256_pem(public_key_pem: &[u8]) -> Result<Self, AuthorizerError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem)
            .map_err(|e| AuthorizerError::Backend(format!("invalid RSA public key: {e}")))?;
        Ok(Self {
            key,
            validation: validation(Algorithm::RS256),
        })
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AuthorizerError> {
        let provider = match settings.algorithm {
            JwtAlgorithm::Hs256 => {
                let secret = settings.secret.as_deref().ok_or_else(|| {
                    AuthorizerError::Backend("HS256 requires a secret".to_string())
                })?;
                Self::hs256(secret.as_bytes())
            }
            JwtAlgorithm::Rs256 => {
                let pem = settings.public_key_pem.as_deref().ok_or_else(|| {
                    AuthorizerError::Backend("RS256 requires a public key".to_string())
                })?;
                Self::rs256_pem(pem.as_bytes())?
            }
        };

        let mut provider = provider.with_leeway(settings.leeway_secs);
        if let Some(issuer) = &settings.issuer {
            provider = provider.with_issuer(issuer);
        }
        if !settings.audience.is_empty() {
            provider = provider.with_audience(&settings.audience);
        }
        Ok(provider)
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self
    }

    pub fn with_audience<A: AsRef<str>>(mut self, audience: &[A]) -> Self {
        let audience: Vec<&str> = audience.iter().map(AsRef::as_ref).collect();
        self.validation.set_audience(&audience);
        self.validation.validate_aud = true;
        self
    }

    pub fn with_leeway(mut self, secs: u64) -> Self {
        self.validation.leeway = secs;
        self
    }

    fn claims(&self, token: &str) -> Result<IdentityClaims, RuntimeError> {
        let data = decode::<Value>(token, &self.key, &self.validation)
            .map_err(|e| RuntimeError::InvalidCredential(e.to_string()))?;
        let claims = data.claims;

        let username = USERNAME_CLAIMS
            .iter()
            .find_map(|name| claims.get(*name).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RuntimeError::InvalidCredential("token has no username".to_string()))?;

        let groups = GROUP_CLAIMS
            .iter()
            .find_map(|name| claims.get(*name))
            .map(group_values)
            .unwrap_or_default();

        Ok(IdentityClaims {
            username: username.to_string(),
            groups,
        })
    }
}

/// Audience is only checked once one is configured
fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.validate_aud = false;
    validation
}

/// Groups may be a single string or an array of strings
fn group_values(value: &Value) -> BTreeSet<String> {
    match value {
        Value::String(group) => BTreeSet::from([group.clone()]),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    }
}

impl fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("algorithms", &self.validation.algorithms)
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> conflux_runtime::Result<IdentityClaims> {
        let claims = self.claims(token);
        if let Err(err) = &claims {
            debug!(error = %err, "Rejected bearer token");
        }
        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn token(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[tokio::test]
    async fn verifies_cognito_style_claims() {
        let provider = JwtIdentityProvider::hs256(SECRET).with_issuer("https://idp");
        let token = token(json!({
            "sub": "u-1",
            "cognito:username": "alice",
            "cognito:groups": ["acme", "beta"],
            "iss": "https://idp",
            "exp": exp(),
        }));

        let claims = provider.verify(&token).await.unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.groups, BTreeSet::from(["acme".to_string(), "beta".to_string()]));
    }

    #[tokio::test]
    async fn falls_back_to_sub_and_single_group() {
        let provider = JwtIdentityProvider::hs256(SECRET);
        let token = token(json!({"sub": "bob", "groups": "acme", "exp": exp()}));

        let claims = provider.verify(&token).await.unwrap();
        assert_eq!(claims.username, "bob");
        assert_eq!(claims.groups.len(), 1);
    }

    #[tokio::test]
    async fn wrong_signature_issuer_or_expiry_is_invalid_credential() {
        let provider = JwtIdentityProvider::hs256(SECRET).with_issuer("https://idp");

        let forged = encode(
            &Header::default(),
            &json!({"sub": "eve", "iss": "https://idp", "exp": exp()}),
            &EncodingKey::from_secret(b"other"),
        )
        .unwrap();
        let wrong_issuer = token(json!({"sub": "eve", "iss": "https://evil", "exp": exp()}));
        let expired = token(json!({"sub": "eve", "iss": "https://idp", "exp": 1_000}));

        for bad in [forged, wrong_issuer, expired, "not-a-jwt".to_string()] {
            let err = provider.verify(&bad).await.unwrap_err();
            assert!(matches!(err, RuntimeError::InvalidCredential(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn audience_is_checked_when_configured() {
        let provider = JwtIdentityProvider::hs256(SECRET).with_audience(&["conflux"]);
        let good = token(json!({"sub": "a", "aud": "conflux", "exp": exp()}));
        let bad = token(json!({"sub": "a", "aud": "elsewhere", "exp": exp()}));

        assert!(provider.verify(&good).await.is_ok());
        assert!(provider.verify(&bad).await.is_err());
    }

    #[test]
    fn settings_require_key_material() {
        let settings = JwtSettings {
            algorithm: JwtAlgorithm::Rs256,
            secret: None,
            public_key_pem: None,
            issuer: None,
            audience: Vec::new(),
            leeway_secs: 0,
        };
        assert!(matches!(
            JwtIdentityProvider::from_settings(&settings),
            Err(AuthorizerError::Backend(_))
        ));
    }
}
