//! Inbound credential classification

use crate::error::AuthorizerError;
use std::fmt;

const BEARER_PREFIX: &str = "bearer ";

/// A credential presented on a data-plane request
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Identity-provider token from `Authorization: Bearer ...`
    Bearer(String),
    /// Platform-issued API key
    ApiKey(String),
}

impl Credential {
    /// Classify a raw authorization value.
    ///
    /// A `Bearer` scheme (any case) is an identity-provider token; any other
    /// non-empty value is an API key.
    pub fn classify(raw: &str) -> Result<Self, AuthorizerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthorizerError::Unauthorized("missing credential".to_string()));
        }

        if raw.eq_ignore_ascii_case(BEARER_PREFIX.trim_end()) {
            return Err(AuthorizerError::Unauthorized("empty bearer token".to_string()));
        }
        let scheme = raw.get(..BEARER_PREFIX.len());
        if scheme.is_some_and(|s| s.eq_ignore_ascii_case(BEARER_PREFIX)) {
            let token = raw[BEARER_PREFIX.len()..].trim();
            if token.is_empty() {
                return Err(AuthorizerError::Unauthorized("empty bearer token".to_string()));
            }
            return Ok(Self::Bearer(token.to_string()));
        }

        Ok(Self::ApiKey(raw.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::ApiKey(_) => "api_key",
        }
    }
}

// Never print the secret
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential::{}(..)", self.kind())
    }
}
