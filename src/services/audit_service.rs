use std::sync::Arc;

use tracing::{debug, error};

use crate::database::models::AuditAction;
use crate::database::repository::InsertAuditLog;
use crate::database::{ConnectionSource, TenantQuery, UnitOfWork};
use crate::tenancy::TenantAwareExecutor;

/// Writes audit rows in the background, into the schema of the tenant that submitted them
pub struct AuditLogger<S> {
    executor: Arc<TenantAwareExecutor>,
    unit_of_work: UnitOfWork<S>,
}

impl<S> Clone for AuditLogger<S> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            unit_of_work: self.unit_of_work.clone(),
        }
    }
}

impl<S> AuditLogger<S>
where
    S: ConnectionSource,
    InsertAuditLog: TenantQuery<S::Connection, Output = ()>,
{
    pub fn new(executor: Arc<TenantAwareExecutor>, unit_of_work: UnitOfWork<S>) -> Self {
        Self {
            executor,
            unit_of_work,
        }
    }

    /// Queue an audit row without waiting. Failures, including a full queue, are
    /// logged and never reach the caller.
    pub fn log(&self, user_id: Option<i64>, action: AuditAction) {
        self.record(InsertAuditLog::new(user_id, action))
    }

    pub fn record(&self, entry: InsertAuditLog) {
        let unit_of_work = self.unit_of_work.clone();
        let action = entry.action;

        let submitted = self
            .executor
            .submit(async move {
                unit_of_work.run(&entry).await?;
                Ok::<(), anyhow::Error>(())
            });

        match submitted {
            Ok(job_id) => debug!("Queued audit entry {} as job {}", action.as_str(), job_id),
            Err(e) => error!("Failed to queue audit entry {}: {}", action.as_str(), e),
        }
    }
}
