use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ClientError;

// =============================================================================
// PERMISSION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    /// Dotted `module.resource.action` code
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub module: String,
    pub resource: String,
    pub action: String,
}

/// Validated permission code of the form `module.resource.action`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionCode {
    raw: String,
}

impl PermissionCode {
    pub fn parse(raw: &str) -> Result<Self, ClientError> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(ClientError::validation(format!(
                "permission code `{raw}` must look like module.resource.action"
            )));
        }
        if parts.iter().any(|p| p.chars().any(char::is_whitespace)) {
            return Err(ClientError::validation(format!(
                "permission code `{raw}` must not contain whitespace"
            )));
        }
        Ok(Self { raw: raw.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn segment(&self, index: usize) -> &str {
        self.raw.split('.').nth(index).unwrap_or_default()
    }

    pub fn module(&self) -> &str {
        self.segment(0)
    }

    pub fn resource(&self) -> &str {
        self.segment(1)
    }

    pub fn action(&self) -> &str {
        self.segment(2)
    }
}

impl FromStr for PermissionCode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PermissionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCodesResponse {
    pub codes: Vec<String>,
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Granted permission codes; order carries no meaning
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub user_count: u32,
}

impl Role {
    pub fn grants(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p == code)
    }

    /// The role is edited only by the backend; its matrix cells stay disabled.
    pub fn is_immutable(&self) -> bool {
        self.name == crate::authz::roles::SUPER_ADMIN
    }

    /// Full replacement code set after toggling `code`, sorted and deduplicated.
    pub fn toggled_permissions(&self, code: &str) -> Vec<String> {
        let mut codes: BTreeSet<String> = self.permissions.iter().cloned().collect();
        if !codes.remove(code) {
            codes.insert(code.to_string());
        }
        codes.into_iter().collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRolePermissionsRequest {
    pub permission_codes: Vec<String>,
}
