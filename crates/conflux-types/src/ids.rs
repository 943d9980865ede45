//! Identifier newtypes
//!
//! Tenant-supplied identifiers (tenant, processor and queue names) are checked
//! with [`validate`](TenantId::validate) before they reach any external call.
//! Substrate-derived names (functions, roles, mappings) are produced by
//! [`crate::naming`] or returned by the substrate and are not re-validated.

use crate::error::IdentifierError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a tenant-supplied identifier
pub const MAX_IDENTIFIER_LEN: usize = 63;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

macro_rules! validated {
    ($name:ident, $kind:literal) => {
        impl $name {
            /// Check the identifier against the tenant-identifier grammar
            pub fn validate(&self) -> Result<(), IdentifierError> {
                validate_identifier($kind, &self.0)
            }
        }
    };
}

string_id!(
    /// Tenant (organization) identifier
    TenantId
);
string_id!(
    /// Processor name, unique within a tenant
    ProcessorName
);
string_id!(
    /// Queue name, unique within a tenant
    QueueName
);
string_id!(
    /// Deterministic managed-function name for a (tenant, processor) pair
    FunctionName
);
string_id!(
    /// Deterministic execution-role name for a (tenant, processor) pair
    RoleName
);
string_id!(
    /// Substrate-issued event-source mapping identifier
    MappingId
);

validated!(TenantId, "tenant id");
validated!(ProcessorName, "processor name");
validated!(QueueName, "queue name");

impl MappingId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Validate `[A-Za-z0-9][A-Za-z0-9_.-]{0,62}`
pub fn validate_identifier(kind: &'static str, value: &str) -> Result<(), IdentifierError> {
    let mut chars = value.chars();
    let first = chars.next().ok_or(IdentifierError::Empty { kind })?;

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierError::TooLong {
            kind,
            value: value.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    if !first.is_ascii_alphanumeric() {
        return Err(IdentifierError::InvalidStart {
            kind,
            value: value.to_string(),
        });
    }

    if let Some(found) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))) {
        return Err(IdentifierError::InvalidCharacter {
            kind,
            value: value.to_string(),
            found,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(TenantId::new("acme").validate().is_ok());
        assert!(ProcessorName::new("order-enricher_v2").validate().is_ok());
        assert!(QueueName::new("orders.raw").validate().is_ok());
    }

    #[test]
    fn test_rejects_wildcards_and_separators() {
        assert!(matches!(
            TenantId::new("acme*").validate(),
            Err(IdentifierError::InvalidCharacter { found: '*', .. })
        ));
        assert!(matches!(
            QueueName::new("a/b").validate(),
            Err(IdentifierError::InvalidCharacter { found: '/', .. })
        ));
    }

    #[test]
    fn test_rejects_empty_and_bad_start() {
        assert!(matches!(
            TenantId::new("").validate(),
            Err(IdentifierError::Empty { .. })
        ));
        assert!(matches!(
            ProcessorName::new("-lead").validate(),
            Err(IdentifierError::InvalidStart { .. })
        ));
    }

    #[test]
    fn test_rejects_long_identifiers() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(matches!(
            QueueName::new(long).validate(),
            Err(IdentifierError::TooLong { .. })
        ));
    }
}
