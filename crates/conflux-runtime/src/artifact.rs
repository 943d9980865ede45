//! Code artifact storage

use crate::error::Result;
use async_trait::async_trait;
use conflux_types::CodeArtifactRef;
use serde::{Deserialize, Serialize};

/// A resolved, immutable code artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub reference: CodeArtifactRef,

    /// Lowercase hex SHA-256 of the content
    pub sha256: String,

    pub size: u64,
}

/// Content-addressed store for compiled processor code
#[async_trait]
pub trait CodeArtifactStore: Send + Sync {
    /// Store bytes and return their reference; storing the same bytes twice
    /// returns the same reference
    async fn put(&self, bytes: Vec<u8>) -> Result<CodeArtifactRef>;

    /// Resolve a reference to artifact metadata
    async fn resolve(&self, reference: &CodeArtifactRef) -> Result<CodeArtifact>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
