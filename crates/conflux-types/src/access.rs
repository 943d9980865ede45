//! Platform-issued API access entries
//!
//! Entries are written by the management path and read by the authorizer on
//! every data-plane request.

use crate::ids::{ProcessorName, QueueName, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A platform-issued credential and its scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAccess {
    /// Credential key presented by the caller
    pub key: String,

    /// Who the key was issued to
    pub owner: CredentialOwner,

    /// Tenant the key belongs to
    pub tenant: TenantId,

    /// Queues the key may target; empty means every queue of the tenant
    #[serde(default)]
    pub queue_whitelist: BTreeSet<QueueName>,

    /// Usage-plan key forwarded to the gateway for throttling
    #[serde(default)]
    pub usage_plan: Option<String>,
}

impl ApiAccess {
    pub fn for_user(key: impl Into<String>, tenant: impl Into<TenantId>, username: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            owner: CredentialOwner::User {
                username: username.into(),
            },
            tenant: tenant.into(),
            queue_whitelist: BTreeSet::new(),
            usage_plan: None,
        }
    }

    pub fn for_processor(
        key: impl Into<String>,
        tenant: impl Into<TenantId>,
        processor: impl Into<ProcessorName>,
    ) -> Self {
        Self {
            key: key.into(),
            owner: CredentialOwner::ProcessorTask {
                processor: processor.into(),
            },
            tenant: tenant.into(),
            queue_whitelist: BTreeSet::new(),
            usage_plan: None,
        }
    }

    pub fn with_whitelist<I, Q>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<QueueName>,
    {
        self.queue_whitelist = queues.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_usage_plan(mut self, usage_plan: impl Into<String>) -> Self {
        self.usage_plan = Some(usage_plan.into());
        self
    }
}

/// Owner of an API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialOwner {
    User { username: String },
    ProcessorTask { processor: ProcessorName },
}

impl CredentialOwner {
    /// Name reported as the request principal
    pub fn principal_name(&self) -> String {
        match self {
            Self::User { username } => username.clone(),
            Self::ProcessorTask { processor } => format!("processor:{processor}"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::ProcessorTask { .. } => "processor_task",
        }
    }
}
