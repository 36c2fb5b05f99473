use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{debug, error, warn};

use super::manager::{DatabaseError, DatabaseManager};
use crate::tenancy::{AllowList, TenantId};

/// A physical connection that can run plain statements
#[async_trait]
pub trait SchemaConnection: Send + 'static {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError>;

    /// Close the connection instead of handing it back to its pool
    fn discard(self)
    where
        Self: Sized,
    {
        drop(self)
    }
}

/// Where raw connections come from
#[async_trait]
pub trait ConnectionSource: Send + Sync + 'static {
    type Connection: SchemaConnection;

    async fn acquire(&self) -> Result<Self::Connection, DatabaseError>;
}

#[async_trait]
impl SchemaConnection for PoolConnection<Postgres> {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError> {
        // No bind arguments, so this goes over the simple query protocol
        sqlx::Executor::execute(&mut **self, statement).await?;
        Ok(())
    }

    fn discard(self) {
        drop(self.detach());
    }
}

#[async_trait]
impl ConnectionSource for PgPool {
    type Connection = PoolConnection<Postgres>;

    async fn acquire(&self) -> Result<Self::Connection, DatabaseError> {
        Ok(PgPool::acquire(self).await?)
    }
}

fn set_search_path(schema: &TenantId) -> String {
    format!(
        "SET search_path TO {}",
        DatabaseManager::quote_identifier(schema.as_str())
    )
}

/// Hands out connections switched to a validated tenant schema
pub struct ConnectionRouter<S> {
    source: S,
    allow_list: Arc<AllowList>,
}

impl<S: ConnectionSource> ConnectionRouter<S> {
    pub fn new(source: S, allow_list: Arc<AllowList>) -> Self {
        Self { source, allow_list }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Raw connection with no schema assumption
    pub async fn acquire(&self) -> Result<S::Connection, DatabaseError> {
        self.source.acquire().await
    }

    /// Acquire a connection and switch it to `identifier` (default schema when absent).
    ///
    /// The identifier is checked against the allow-list before a connection is acquired
    /// or a statement is built; only allow-listed names ever reach `SET search_path`.
    pub async fn bind(
        &self,
        identifier: Option<&str>,
    ) -> Result<BoundConnection<S::Connection>, DatabaseError> {
        let schema = match identifier {
            Some(identifier) => self.allow_list.validate(identifier).map_err(|e| {
                error!(
                    "Attempted to access invalid tenant schema: {:?}. Allowed schemas: {:?}, default: {}",
                    identifier,
                    self.allow_list.tenants(),
                    self.allow_list.default_schema()
                );
                e
            })?,
            None => self.allow_list.default_schema().clone(),
        };

        let mut conn = self.acquire().await?;
        if let Err(e) = conn.execute(&set_search_path(&schema)).await {
            error!("Failed to set schema to {}: {}", schema, e);
            conn.discard();
            return Err(e);
        }
        debug!("Successfully switched database schema to: {}", schema);

        Ok(BoundConnection {
            conn: Some(conn),
            schema,
            default_schema: self.allow_list.default_schema().clone(),
            in_transaction: false,
        })
    }

    /// Reset to the default schema and return the connection to the pool
    pub async fn release(&self, bound: BoundConnection<S::Connection>) {
        bound.release().await
    }
}

/// A connection currently bound to one schema.
///
/// `release` resets it to the default schema before it goes back to the pool. If the
/// value is dropped instead (panic, cancelled future), the connection is closed so a
/// stale `search_path` can never reach the next borrower.
pub struct BoundConnection<C: SchemaConnection> {
    conn: Option<C>,
    schema: TenantId,
    default_schema: TenantId,
    in_transaction: bool,
}

impl<C: SchemaConnection> BoundConnection<C> {
    pub fn schema(&self) -> &TenantId {
        &self.schema
    }

    pub fn connection(&mut self) -> &mut C {
        match self.conn.as_mut() {
            Some(conn) => conn,
            None => unreachable!("bound connection is only taken by release or drop"),
        }
    }

    pub async fn begin(&mut self, read_only: bool) -> Result<(), DatabaseError> {
        let statement = if read_only { "BEGIN READ ONLY" } else { "BEGIN" };
        self.connection().execute(statement).await?;
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.connection().execute("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.connection().execute("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    pub async fn release(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        if self.in_transaction {
            if let Err(e) = conn.execute("ROLLBACK").await {
                error!(
                    "Failed to roll back open transaction for tenant {}; closing connection: {}",
                    self.schema, e
                );
                conn.discard();
                return;
            }
        }

        match conn.execute(&set_search_path(&self.default_schema)).await {
            Ok(()) => debug!(
                "Reset schema to {} before releasing connection for tenant: {}",
                self.default_schema, self.schema
            ),
            Err(e) => {
                // Never return a connection whose schema is unknown
                error!(
                    "Error resetting schema to default before releasing connection for tenant {}: {}",
                    self.schema, e
                );
                conn.discard();
            }
        }
    }
}

impl<C: SchemaConnection> Drop for BoundConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(
                "Connection bound to schema {} dropped without release; closing it",
                self.schema
            );
            conn.discard();
        }
    }
}
