use serde::Serialize;
use tracing::{debug, error};

use super::marker::TenantMarker;
use super::tenant_id::TenantId;
use crate::database::{ConnectionSource, TenantQuery, UnitOfWork};

/// One tenant's share of a cross-tenant read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantOutcome<T> {
    pub tenant: TenantId,
    pub value: T,
    /// The query failed for this tenant and `value` is the zero value
    pub failed: bool,
}

/// Runs one read-only query against every tenant in turn
pub struct CrossTenantAggregator<S> {
    unit_of_work: UnitOfWork<S>,
    tenants: Vec<TenantId>,
}

impl<S: ConnectionSource> CrossTenantAggregator<S> {
    /// Walks every allow-listed tenant, in declared order
    pub fn new(unit_of_work: UnitOfWork<S>) -> Self {
        let tenants = unit_of_work.router().allow_list().tenants().to_vec();
        Self {
            unit_of_work,
            tenants,
        }
    }

    pub fn tenants(&self) -> &[TenantId] {
        &self.tenants
    }

    /// One entry per tenant, in order. Each tenant runs in its own read-only transaction on
    /// its own binding; a tenant that fails contributes `Default::default()` and does not
    /// abort the walk. The caller's marker is unchanged afterwards.
    pub async fn aggregate<Q>(&self, query: &Q) -> Vec<TenantOutcome<Q::Output>>
    where
        Q: TenantQuery<S::Connection>,
        Q::Output: Default,
    {
        if TenantMarker::is_scoped() {
            self.walk(query).await
        } else {
            TenantMarker::scope(self.walk(query)).await
        }
    }

    async fn walk<Q>(&self, query: &Q) -> Vec<TenantOutcome<Q::Output>>
    where
        Q: TenantQuery<S::Connection>,
        Q::Output: Default,
    {
        let _restore = TenantMarker::save();
        let mut outcomes = Vec::with_capacity(self.tenants.len());

        for tenant in &self.tenants {
            TenantMarker::set(tenant.clone());

            let outcome = match self.unit_of_work.read_only(query).await {
                Ok(value) => TenantOutcome {
                    tenant: tenant.clone(),
                    value,
                    failed: false,
                },
                Err(e) => {
                    error!("Error fetching data for tenant {}: {}", tenant, e);
                    TenantOutcome {
                        tenant: tenant.clone(),
                        value: Q::Output::default(),
                        failed: true,
                    }
                }
            };
            outcomes.push(outcome);
        }

        debug!(
            "Aggregated {} tenants, {} failed",
            outcomes.len(),
            outcomes.iter().filter(|o| o.failed).count()
        );
        outcomes
    }
}
