use tracing::debug;

use super::marker::TenantMarker;
use super::tenant_id::TenantId;

/// Answers which schema the next unit of work should use
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    default_schema: TenantId,
}

impl SchemaResolver {
    pub fn new(default_schema: TenantId) -> Self {
        Self { default_schema }
    }

    pub fn default_schema(&self) -> &TenantId {
        &self.default_schema
    }

    /// Marker value verbatim, or the default schema when no tenant context exists.
    ///
    /// Called at every unit-of-work boundary and never cached: a worker task may serve
    /// different tenants from one job to the next.
    pub fn resolve_current_schema(&self) -> TenantId {
        match TenantMarker::get() {
            Some(tenant) => {
                debug!("Resolved tenant schema: {}", tenant);
                tenant
            }
            None => {
                debug!(
                    "No tenant context set, using default schema: {}",
                    self.default_schema
                );
                self.default_schema.clone()
            }
        }
    }
}
