//! Execution role types

use crate::ids::RoleName;
use crate::policy::PolicyDocument;
use serde::{Deserialize, Serialize};

/// An execution role as described by the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamRole {
    /// Deterministic role name
    pub name: RoleName,

    /// Role ARN
    pub arn: String,

    /// Permission boundary capping every grant on this role
    pub permission_boundary_arn: Option<String>,

    /// Trust policy controlling who may assume the role
    pub trust_policy: PolicyDocument,

    /// Free-form description
    pub description: String,

    /// Created timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
}
