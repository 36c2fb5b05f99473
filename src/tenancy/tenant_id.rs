use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::TenancyError;
use crate::config::TenancyConfig;

/// Identifier of one campus schema (or the reserved default schema)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Campus name for display, e.g. "east" -> "East"
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Closed set of schemas a connection may be bound to.
///
/// The tenant set keeps its declared order; cross-tenant walks follow it.
/// The default schema is only reachable through `validate`, never through `tenant`,
/// so a login payload can not name it.
#[derive(Debug, Clone)]
pub struct AllowList {
    tenants: Vec<TenantId>,
    default_schema: TenantId,
}

impl AllowList {
    pub fn new<I, S>(tenants: I, default_schema: impl Into<String>) -> Result<Self, TenancyError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default_schema = default_schema.into();
        if !Self::is_schema_name(&default_schema) {
            return Err(TenancyError::InvalidSchemaName(default_schema));
        }

        let mut list: Vec<TenantId> = Vec::new();
        for tenant in tenants {
            let tenant = tenant.into();
            if !Self::is_schema_name(&tenant) || tenant == default_schema {
                return Err(TenancyError::InvalidSchemaName(tenant));
            }
            if !list.iter().any(|t| t.as_str() == tenant) {
                list.push(TenantId::new(tenant));
            }
        }

        Ok(Self {
            tenants: list,
            default_schema: TenantId::new(default_schema),
        })
    }

    pub fn from_config(config: &TenancyConfig) -> Result<Self, TenancyError> {
        Self::new(config.schemas.iter().cloned(), config.default_schema.clone())
    }

    pub fn tenants(&self) -> &[TenantId] {
        &self.tenants
    }

    pub fn default_schema(&self) -> &TenantId {
        &self.default_schema
    }

    /// Look up a campus code from the closed tenant set (default schema excluded)
    pub fn tenant(&self, code: &str) -> Option<&TenantId> {
        self.tenants.iter().find(|t| t.as_str() == code)
    }

    /// Validate a routing identifier against tenants plus the default schema
    pub fn validate(&self, identifier: &str) -> Result<TenantId, TenancyError> {
        if identifier == self.default_schema.as_str() {
            return Ok(self.default_schema.clone());
        }
        self.tenant(identifier)
            .cloned()
            .ok_or_else(|| TenancyError::InvalidTenantSchema(identifier.to_string()))
    }

    /// Schema names must be plain lowercase SQL identifiers: [a-z_][a-z0-9_]*
    fn is_schema_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {}
            _ => return false,
        }
        name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}
