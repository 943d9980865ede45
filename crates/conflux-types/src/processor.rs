//! Processor declarations
//!
//! A Processor is tenant code with a declared set of input and output queues.
//! Queue sets are ordered so that every traversal over them is deterministic.

use crate::error::IdentifierError;
use crate::ids::{ProcessorName, QueueName, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A tenant-declared processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    /// Owning tenant
    pub tenant: TenantId,

    /// Name, unique within the tenant
    pub name: ProcessorName,

    /// Queues this processor consumes from
    pub inputs: BTreeSet<QueueName>,

    /// Queues this processor produces to
    pub outputs: BTreeSet<QueueName>,

    /// Last uploaded code artifact, if any
    pub artifact: Option<CodeArtifactRef>,

    /// Requested limits, clamped to the tenant plan at deploy time
    #[serde(default)]
    pub limits: ProcessorLimits,
}

impl Processor {
    pub fn new(tenant: impl Into<TenantId>, name: impl Into<ProcessorName>) -> Self {
        Self {
            tenant: tenant.into(),
            name: name.into(),
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            artifact: None,
            limits: ProcessorLimits::default(),
        }
    }

    pub fn with_inputs<I, Q>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<QueueName>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs<I, Q>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<QueueName>,
    {
        self.outputs = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_limits(mut self, limits: ProcessorLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn input_refs(&self) -> impl Iterator<Item = QueueRef> + '_ {
        self.inputs
            .iter()
            .map(move |q| QueueRef::new(self.tenant.clone(), q.clone()))
    }

    pub fn output_refs(&self) -> impl Iterator<Item = QueueRef> + '_ {
        self.outputs
            .iter()
            .map(move |q| QueueRef::new(self.tenant.clone(), q.clone()))
    }

    /// Validate every tenant-supplied identifier on this declaration
    pub fn validate(&self) -> Result<(), IdentifierError> {
        self.tenant.validate()?;
        self.name.validate()?;
        for queue in self.inputs.iter().chain(self.outputs.iter()) {
            queue.validate()?;
        }
        Ok(())
    }
}

/// Tenant-scoped queue reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueueRef {
    pub tenant: TenantId,
    pub name: QueueName,
}

impl QueueRef {
    pub fn new(tenant: TenantId, name: QueueName) -> Self {
        Self { tenant, name }
    }

    /// Stable tenant-scoped identifier (`tenant/queue`)
    pub fn id(&self) -> String {
        format!("{}/{}", self.tenant, self.name)
    }
}

impl fmt::Display for QueueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.name)
    }
}

/// Immutable reference to an uploaded code bundle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeArtifactRef(String);

impl CodeArtifactRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CodeArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Limits requested by a processor declaration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorLimits {
    pub memory_mb: Option<u32>,
    pub timeout_secs: Option<u32>,
    pub reserved_concurrency: Option<u32>,
    pub batch_size: Option<u32>,
}
