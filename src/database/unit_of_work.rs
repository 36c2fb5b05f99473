use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::manager::DatabaseError;
use super::router::{ConnectionRouter, ConnectionSource};
use crate::tenancy::SchemaResolver;

/// A query that runs against whatever schema its connection is bound to
#[async_trait]
pub trait TenantQuery<C: Send>: Send + Sync {
    type Output: Send;

    async fn execute(&self, conn: &mut C) -> Result<Self::Output, DatabaseError>;
}

/// Explicit pre/post pair around one unit of work:
/// resolve the schema and bind before, reset and release after.
pub struct UnitOfWork<S> {
    router: Arc<ConnectionRouter<S>>,
    resolver: SchemaResolver,
}

impl<S> Clone for UnitOfWork<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<S: ConnectionSource> UnitOfWork<S> {
    pub fn new(router: Arc<ConnectionRouter<S>>) -> Self {
        let resolver = SchemaResolver::new(router.allow_list().default_schema().clone());
        Self { router, resolver }
    }

    pub fn router(&self) -> &ConnectionRouter<S> {
        &self.router
    }

    /// Run `query` in autocommit mode on a connection bound to the current tenant
    pub async fn run<Q>(&self, query: &Q) -> Result<Q::Output, DatabaseError>
    where
        Q: TenantQuery<S::Connection>,
    {
        let schema = self.resolver.resolve_current_schema();
        let mut bound = self.router.bind(Some(schema.as_str())).await?;
        let result = query.execute(bound.connection()).await;
        bound.release().await;
        result
    }

    /// Run `query` inside its own read-only transaction
    pub async fn read_only<Q>(&self, query: &Q) -> Result<Q::Output, DatabaseError>
    where
        Q: TenantQuery<S::Connection>,
    {
        self.transaction(query, true).await
    }

    /// Run `query` inside its own transaction; commit on success, roll back on error
    pub async fn transaction<Q>(&self, query: &Q, read_only: bool) -> Result<Q::Output, DatabaseError>
    where
        Q: TenantQuery<S::Connection>,
    {
        let schema = self.resolver.resolve_current_schema();
        let mut bound = self.router.bind(Some(schema.as_str())).await?;

        let result = match bound.begin(read_only).await {
            Ok(()) => query.execute(bound.connection()).await,
            Err(e) => Err(e),
        };

        let result = match result {
            Ok(output) => bound.commit().await.map(|_| output),
            Err(e) => {
                if let Err(rollback) = bound.rollback().await {
                    warn!("Rollback failed for schema {}: {}", bound.schema(), rollback);
                }
                Err(e)
            }
        };

        bound.release().await;
        result
    }
}
