use super::OperationHooks;
use crate::artifact::{CodeArtifact, CodeArtifactStore};
use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use conflux_types::CodeArtifactRef;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// In-memory content-addressed artifact store
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    artifacts: DashMap<CodeArtifactRef, CodeArtifact>,
    hooks: OperationHooks,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hooks(&self) -> &OperationHooks {
        &self.hooks
    }
}

#[async_trait]
impl CodeArtifactStore for InMemoryArtifactStore {
    async fn close(&self) -> Result<()> {
        self.hooks.enter("close")
    }

    async fn put(&self, bytes: Vec<u8>) -> Result<CodeArtifactRef> {
        self.hooks.enter("put")?;

        let sha256 = format!("{:x}", Sha256::digest(&bytes));
        let reference = CodeArtifactRef::new(format!("sha256:{sha256}"));
        self.artifacts
            .entry(reference.clone())
            .or_insert_with(|| CodeArtifact {
                reference: reference.clone(),
                sha256,
                size: bytes.len() as u64,
            });
        Ok(reference)
    }

    async fn resolve(&self, reference: &CodeArtifactRef) -> Result<CodeArtifact> {
        self.hooks.enter("resolve")?;
        self.artifacts
            .get(reference)
            .map(|a| a.clone())
            .ok_or_else(|| RuntimeError::not_found("code artifact", reference.as_str()))
    }
}
