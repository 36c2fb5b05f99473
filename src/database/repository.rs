//! Queries against a campus schema. Table names are unqualified; the bound connection's
//! `search_path` decides which campus they hit.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

use super::manager::DatabaseError;
use super::models::{AuditAction, NewVehicle, User};
use super::unit_of_work::TenantQuery;

/// User whose mobile number hashes to `mobile_hash`, restricted to one campus
#[derive(Debug, Clone)]
pub struct UserByMobileHash {
    pub mobile_hash: String,
    pub tenant_id: String,
}

#[async_trait]
impl TenantQuery<PoolConnection<Postgres>> for UserByMobileHash {
    type Output = Option<User>;

    async fn execute(&self, conn: &mut PoolConnection<Postgres>) -> Result<Self::Output, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, tenant_id, mobile_number, mobile_hash, pin_hash, role, active, created_at, updated_at \
             FROM users WHERE mobile_hash = $1 AND tenant_id = $2",
        )
        .bind(&self.mobile_hash)
        .bind(&self.tenant_id)
        .fetch_optional(&mut **conn)
        .await?;

        Ok(user)
    }
}

/// Vehicles that arrived on `date`, split by type
#[derive(Debug, Clone)]
pub struct ArrivalCounts {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArrivalStats {
    pub bikes: i64,
    pub cars: i64,
}

impl ArrivalStats {
    pub fn total(&self) -> i64 {
        self.bikes + self.cars
    }
}

#[async_trait]
impl TenantQuery<PoolConnection<Postgres>> for ArrivalCounts {
    type Output = ArrivalStats;

    async fn execute(&self, conn: &mut PoolConnection<Postgres>) -> Result<Self::Output, DatabaseError> {
        let (bikes, cars) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT \
                COUNT(*) FILTER (WHERE v.vehicle_type = 'BIKE'), \
                COUNT(*) FILTER (WHERE v.vehicle_type = 'CAR') \
             FROM visits vi JOIN vehicles v ON v.id = vi.vehicle_id \
             WHERE vi.visit_date = $1",
        )
        .bind(self.date)
        .fetch_one(&mut **conn)
        .await?;

        Ok(ArrivalStats { bikes, cars })
    }
}

#[derive(Debug, Clone)]
pub struct InsertAuditLog {
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
}

impl InsertAuditLog {
    pub fn new(user_id: Option<i64>, action: AuditAction) -> Self {
        Self {
            user_id,
            action,
            entity_type: None,
            entity_id: None,
            details: None,
        }
    }

    pub fn with_entity(mut self, entity_type: &str, entity_id: impl ToString) -> Self {
        self.entity_type = Some(entity_type.to_string());
        self.entity_id = Some(entity_id.to_string());
        self
    }
}

#[async_trait]
impl TenantQuery<PoolConnection<Postgres>> for InsertAuditLog {
    type Output = ();

    async fn execute(&self, conn: &mut PoolConnection<Postgres>) -> Result<Self::Output, DatabaseError> {
        sqlx::query(
            "INSERT INTO audit_logs (user_id, action, entity_type, entity_id, details, timestamp) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(self.user_id)
        .bind(self.action.as_str())
        .bind(&self.entity_type)
        .bind(&self.entity_id)
        .bind(&self.details)
        .execute(&mut **conn)
        .await?;

        Ok(())
    }
}

/// Insert a vehicle; both PII columns arrive already encrypted and hashed. Returns the new id.
#[derive(Debug, Clone)]
pub struct InsertVehicle(pub NewVehicle);

#[async_trait]
impl TenantQuery<PoolConnection<Postgres>> for InsertVehicle {
    type Output = i64;

    async fn execute(&self, conn: &mut PoolConnection<Postgres>) -> Result<Self::Output, DatabaseError> {
        let vehicle = &self.0;
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO vehicles \
                (owner_name, owner_mobile, owner_mobile_hash, vehicle_number, vehicle_number_hash, \
                 vehicle_type, created_by_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&vehicle.owner_name)
        .bind(&vehicle.owner_mobile.ciphertext)
        .bind(&vehicle.owner_mobile.search_hash)
        .bind(&vehicle.vehicle_number.ciphertext)
        .bind(&vehicle.vehicle_number.search_hash)
        .bind(vehicle.vehicle_type.as_str())
        .bind(vehicle.created_by_id)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| constraint_error(e, "vehicle number"))?;

        Ok(id)
    }
}

/// Record that a vehicle arrived. One visit per vehicle per day. Returns the new visit id.
#[derive(Debug, Clone)]
pub struct InsertVisit {
    pub vehicle_id: i64,
    pub visit_date: NaiveDate,
    pub arrived_at: NaiveDateTime,
    pub marked_by_id: i64,
}

#[async_trait]
impl TenantQuery<PoolConnection<Postgres>> for InsertVisit {
    type Output = i64;

    async fn execute(&self, conn: &mut PoolConnection<Postgres>) -> Result<Self::Output, DatabaseError> {
        let (id,) = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO visits (vehicle_id, visit_date, arrived_at, marked_by_id) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(self.vehicle_id)
        .bind(self.visit_date)
        .bind(self.arrived_at)
        .bind(self.marked_by_id)
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| constraint_error(e, "visit"))?;

        Ok(id)
    }
}

/// Unique and foreign-key violations become `Conflict` / `NotFound`
fn constraint_error(err: sqlx::Error, what: &str) -> DatabaseError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some("23505") => return DatabaseError::Conflict(what.to_string()),
            Some("23503") => return DatabaseError::NotFound(what.to_string()),
            _ => {}
        }
    }
    DatabaseError::Sqlx(err)
}
