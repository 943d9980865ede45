//! Policy documents
//!
//! One statement model serves role trust policies, inline least-privilege
//! policies and the authorizer's per-request access policy.
//!
//! A statement applies to a resource when the resource matches one of its
//! `Resource` patterns (or `Resource` is empty) and matches none of its
//! `NotResource` patterns. Evaluation follows the usual rules: an applicable
//! Deny wins, otherwise an applicable Allow grants, otherwise the request is
//! denied.

use serde::{Deserialize, Serialize};

/// Policy language version written into every document
pub const POLICY_VERSION: &str = "2012-10-17";

/// A policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements: Vec::new(),
        }
    }
}

impl PolicyDocument {
    pub fn new(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Effective decision for `action` on `resource`
    pub fn evaluate(&self, action: &str, resource: &str) -> Effect {
        let mut allowed = false;
        for statement in &self.statements {
            if !statement.applies(action, resource) {
                continue;
            }
            match statement.effect {
                Effect::Deny => return Effect::Deny,
                Effect::Allow => allowed = true,
            }
        }
        if allowed {
            Effect::Allow
        } else {
            Effect::Deny
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A single policy statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(rename = "Action")]
    pub actions: Vec<String>,

    #[serde(rename = "Resource", default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(rename = "NotResource", default, skip_serializing_if = "Vec::is_empty")]
    pub not_resources: Vec<String>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::build(Effect::Allow, actions, resources)
    }

    pub fn deny<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::build(Effect::Deny, actions, resources)
    }

    fn build<A, R>(effect: Effect, actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            sid: None,
            effect,
            principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            not_resources: Vec::new(),
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn except<R>(mut self, patterns: R) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
    {
        self.not_resources.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn applies(&self, action: &str, resource: &str) -> bool {
        let action_matches = self.actions.iter().any(|a| wildcard_match(a, action));
        let in_scope = self.resources.is_empty()
            || self.resources.iter().any(|r| wildcard_match(r, resource));
        let excepted = self.not_resources.iter().any(|r| wildcard_match(r, resource));
        action_matches && in_scope && !excepted
    }
}

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Principal a trust statement admits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Principal {
    Service(String),
    #[serde(rename = "AWS")]
    Account(String),
}

/// Glob match where `*` spans any run of characters, including `/`
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let (mut p_idx, mut v_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);
    let pattern = pattern.as_bytes();
    let value = value.as_bytes();

    while v_idx < value.len() {
        if p_idx < pattern.len() && pattern[p_idx] == b'*' {
            star_idx = Some(p_idx);
            match_idx = v_idx;
            p_idx += 1;
            continue;
        }

        if p_idx < pattern.len() && pattern[p_idx] == value[v_idx] {
            p_idx += 1;
            v_idx += 1;
            continue;
        }

        if let Some(star) = star_idx {
            p_idx = star + 1;
            match_idx += 1;
            v_idx = match_idx;
            continue;
        }

        return false;
    }

    while p_idx < pattern.len() && pattern[p_idx] == b'*' {
        p_idx += 1;
    }

    p_idx == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_exact_and_suffix() {
        assert!(wildcard_match("queue:acme/orders", "queue:acme/orders"));
        assert!(!wildcard_match("queue:acme/orders", "queue:acme/orders2"));
        assert!(wildcard_match("queue:acme/*", "queue:acme/orders/dlq"));
        assert!(!wildcard_match("queue:acme/*", "queue:other/orders"));
    }

    #[test]
    fn wildcard_backtracks() {
        assert!(wildcard_match("api/*/organization/*", "api/POST/organization/acme"));
        assert!(!wildcard_match("api/*/organization/*", "api/POST/health"));
    }

    #[test]
    fn explicit_deny_wins() {
        let doc = PolicyDocument::new(vec![
            PolicyStatement::allow(["sqs:*"], ["*"]),
            PolicyStatement::deny(["sqs:*"], ["arn:q/secret"]),
        ]);
        assert_eq!(doc.evaluate("sqs:SendMessage", "arn:q/public"), Effect::Allow);
        assert_eq!(doc.evaluate("sqs:SendMessage", "arn:q/secret"), Effect::Deny);
    }

    #[test]
    fn no_matching_statement_denies() {
        let doc = PolicyDocument::new(vec![PolicyStatement::allow(["sqs:ReceiveMessage"], ["*"])]);
        assert_eq!(doc.evaluate("sqs:SendMessage", "arn:q"), Effect::Deny);
    }

    #[test]
    fn not_resource_carves_exceptions() {
        let deny = PolicyStatement::deny(["invoke"], ["api/*"]).except(["api/public/*"]);
        assert!(deny.applies("invoke", "api/private/x"));
        assert!(!deny.applies("invoke", "api/public/x"));
    }

    #[test]
    fn serializes_with_policy_field_names() {
        let doc = PolicyDocument::new(vec![PolicyStatement::allow(["sts:AssumeRole"], Vec::<String>::new())
            .with_principal(Principal::Service("lambda.amazonaws.com".into()))]);
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"Version\":\"2012-10-17\""));
        assert!(json.contains("\"Statement\""));
        assert!(json.contains("\"Principal\":{\"Service\":\"lambda.amazonaws.com\"}"));
        assert!(!json.contains("Resource"));
    }
}
