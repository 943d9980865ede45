//! Per-request access policies
//!
//! Every caller gets the same two statements:
//!
//! - Allow the action on every platform resource
//! - Deny it on the organization-scoped ingest paths, except for the
//!   patterns the caller is allowed
//!
//! - Deny it on any path naming a second organization segment
//!
//! Wildcards in resource patterns span `/`, so without the last statement a
//! path such as `/organization/other/x/organization/acme/y` would match the
//! caller's exception. The deny lists only the caller's own patterns, so the
//! policy stays the same size however many tenants exist.

use conflux_types::{Effect, PolicyDocument, PolicyStatement, QueueName};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Who the caller is once their credential is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerScope {
    pub username: String,

    /// Organizations the caller may act in
    pub organizations: BTreeSet<String>,

    /// Queues the caller may target; empty means all of them
    pub queue_whitelist: BTreeSet<QueueName>,

    pub usage_plan: Option<String>,

    /// Kind of the API key owner; `None` for bearer tokens
    pub owner_kind: Option<String>,
}

impl CallerScope {
    pub fn new<I, O>(username: impl Into<String>, organizations: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<String>,
    {
        Self {
            username: username.into(),
            organizations: organizations.into_iter().map(Into::into).collect(),
            queue_whitelist: BTreeSet::new(),
            usage_plan: None,
            owner_kind: None,
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
}

/// The authorizer's answer for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub principal_id: String,
    pub document: PolicyDocument,

    /// Forwarded to downstream handlers
    pub context: BTreeMap<String, String>,

    /// Usage-plan key for gateway throttling
    pub usage_identifier_key: Option<String>,

    action: String,
}

impl AccessPolicy {
    /// Effective decision for a concrete resource path
    pub fn evaluate(&self, resource: &str) -> Effect {
        self.document.evaluate(&self.action, resource)
    }

    pub fn is_allowed(&self, resource: &str) -> bool {
        self.evaluate(resource) == Effect::Allow
    }

    pub fn action(&self) -> &str {
        &self.action
    }
}

/// Reduce a path segment to `[A-Za-z0-9_.-]`
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}

/// Resource patterns the caller may reach under the organization paths
pub fn allowed_patterns(root: &str, scope: &CallerScope) -> Vec<String> {
    let mut patterns = Vec::new();
    for organization in &scope.organizations {
        let organization = sanitize_segment(organization);
        if organization.is_empty() {
            continue;
        }
        let base = format!("{root}/organization/{organization}");

        if scope.queue_whitelist.is_empty() {
            patterns.push(format!("{base}/*"));
            continue;
        }
        for queue in &scope.queue_whitelist {
            let queue = sanitize_segment(queue.as_str());
            if queue.is_empty() {
                continue;
            }
            patterns.push(format!("{base}/target/{queue}"));
            patterns.push(format!("{base}/target/{queue}/*"));
        }
    }
    patterns
}

/// Build the access policy for a resolved caller
pub fn build_policy(root: &str, action: &str, scope: &CallerScope) -> AccessPolicy {
    let allow_all = PolicyStatement::allow([action], [format!("{root}/*")]).with_sid("AllowPlatform");
    let deny_others = PolicyStatement::deny([action], [format!("{root}/organization/*")])
        .except(allowed_patterns(root, scope))
        .with_sid("DenyOtherOrganizations");
    let deny_nested = PolicyStatement::deny(
        [action],
        [format!("{root}/organization/*/organization/*")],
    )
    .with_sid("DenyNestedOrganizations");

    let mut context = BTreeMap::new();
    context.insert("username".to_string(), scope.username.clone());
    context.insert(
        "organizations".to_string(),
        scope
            .organizations
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(","),
    );
    if let Some(kind) = &scope.owner_kind {
        context.insert("owner_kind".to_string(), kind.clone());
    }

    AccessPolicy {
        principal_id: scope.username.clone(),
        document: PolicyDocument::new(vec![allow_all, deny_others, deny_nested]),
        context,
        usage_identifier_key: scope.usage_plan.clone(),
        action: action.to_string(),
    }
}
