//! Bearer-token identity verification

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Verified claims of a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub username: String,

    /// Group memberships; each group is an organization
    #[serde(default)]
    pub groups: BTreeSet<String>,
}

impl IdentityClaims {
    pub fn new<I, G>(username: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        Self {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }
}

/// Verifies bearer tokens issued by the identity provider
///
/// An invalid, expired or unknown token is reported as
/// [`crate::RuntimeError::InvalidCredential`]; any other error is a backend
/// failure.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaims>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
