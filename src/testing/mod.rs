//! In-memory connection source for unit tests.
//!
//! Every statement run on a `RecordingConnection` is logged in order, and the connection
//! tracks which schema its last `SET search_path` selected so fixture queries answer per
//! campus. Connections count as returned when dropped and as discarded when closed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use crate::database::models::{NewVehicle, Role, User};
use crate::database::repository::{
    ArrivalCounts, ArrivalStats, InsertAuditLog, InsertVehicle, InsertVisit, UserByMobileHash,
};
use crate::database::{ConnectionSource, DatabaseError, SchemaConnection, TenantQuery};

#[derive(Default)]
struct Recorded {
    statements: Vec<String>,
    failing_statements: HashSet<String>,
    failing_schemas: HashSet<String>,
    acquired: usize,
    returned: usize,
    discarded: usize,
    users: HashMap<String, Vec<User>>,
    arrivals: HashMap<String, ArrivalStats>,
    audit: Vec<(String, Option<i64>, String)>,
    vehicles: HashMap<String, Vec<NewVehicle>>,
    visits: HashMap<String, Vec<(i64, NaiveDate)>>,
}

#[derive(Clone, Default)]
pub struct RecordingSource {
    state: Arc<Mutex<Recorded>>,
}

impl RecordingSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap()
    }

    /// Make `statement` fail every time it is executed
    pub fn failing_on(self, statement: &str) -> Self {
        self.lock().failing_statements.insert(statement.to_string());
        self
    }

    /// Make every fixture query fail while bound to `schema`
    pub fn failing_schema(self, schema: &str) -> Self {
        self.lock().failing_schemas.insert(schema.to_string());
        self
    }

    pub fn with_user(self, schema: &str, user: User) -> Self {
        self.lock().users.entry(schema.to_string()).or_default().push(user);
        self
    }

    pub fn with_arrivals(self, schema: &str, bikes: i64, cars: i64) -> Self {
        self.lock()
            .arrivals
            .insert(schema.to_string(), ArrivalStats { bikes, cars });
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    pub fn returned(&self) -> usize {
        self.lock().returned
    }

    pub fn discarded(&self) -> usize {
        self.lock().discarded
    }

    /// Vehicles inserted into `schema`; a vehicle's id is its position plus one
    pub fn vehicles(&self, schema: &str) -> Vec<NewVehicle> {
        self.lock().vehicles.get(schema).cloned().unwrap_or_default()
    }

    /// `(vehicle_id, visit_date)` for every visit inserted into `schema`
    pub fn visits(&self, schema: &str) -> Vec<(i64, NaiveDate)> {
        self.lock().visits.get(schema).cloned().unwrap_or_default()
    }

    /// `(schema, user_id, action)` for every audit row written
    pub fn audit_entries(&self) -> Vec<(String, Option<i64>, String)> {
        self.lock().audit.clone()
    }
}

#[async_trait]
impl ConnectionSource for RecordingSource {
    type Connection = RecordingConnection;

    async fn acquire(&self) -> Result<RecordingConnection, DatabaseError> {
        self.lock().acquired += 1;
        Ok(RecordingConnection {
            state: self.state.clone(),
            schema: None,
            closed: false,
        })
    }
}

pub struct RecordingConnection {
    state: Arc<Mutex<Recorded>>,
    schema: Option<String>,
    closed: bool,
}

impl RecordingConnection {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    fn bound_schema(&self) -> Result<String, DatabaseError> {
        let schema = self.schema.clone().unwrap_or_default();
        if self.lock().failing_schemas.contains(&schema) {
            return Err(DatabaseError::QueryError(format!(
                "relation \"{}.visits\" does not exist",
                schema
            )));
        }
        Ok(schema)
    }
}

#[async_trait]
impl SchemaConnection for RecordingConnection {
    async fn execute(&mut self, statement: &str) -> Result<(), DatabaseError> {
        {
            let mut state = self.lock();
            state.statements.push(statement.to_string());
            if state.failing_statements.contains(statement) {
                return Err(DatabaseError::QueryError(format!("failed: {}", statement)));
            }
        }

        if let Some(quoted) = statement.strip_prefix("SET search_path TO ") {
            self.schema = Some(quoted.trim_matches('"').to_string());
        }
        Ok(())
    }

    fn discard(mut self) {
        self.closed = true;
        self.lock().discarded += 1;
    }
}

impl Drop for RecordingConnection {
    fn drop(&mut self) {
        if !self.closed {
            self.lock().returned += 1;
        }
    }
}

/// Reports the schema the connection is bound to
pub struct CurrentSchema;

#[async_trait]
impl TenantQuery<RecordingConnection> for CurrentSchema {
    type Output = String;

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<String, DatabaseError> {
        Ok(conn.schema().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl TenantQuery<RecordingConnection> for UserByMobileHash {
    type Output = Option<User>;

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<Option<User>, DatabaseError> {
        let schema = conn.bound_schema()?;
        let state = conn.lock();
        Ok(state.users.get(&schema).and_then(|users| {
            users
                .iter()
                .find(|u| u.mobile_hash == self.mobile_hash && u.tenant_id == self.tenant_id)
                .cloned()
        }))
    }
}

#[async_trait]
impl TenantQuery<RecordingConnection> for ArrivalCounts {
    type Output = ArrivalStats;

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<ArrivalStats, DatabaseError> {
        let schema = conn.bound_schema()?;
        let state = conn.lock();
        Ok(state.arrivals.get(&schema).copied().unwrap_or_default())
    }
}

#[async_trait]
impl TenantQuery<RecordingConnection> for InsertAuditLog {
    type Output = ();

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<(), DatabaseError> {
        let schema = conn.bound_schema()?;
        conn.lock()
            .audit
            .push((schema, self.user_id, self.action.as_str().to_string()));
        Ok(())
    }
}

#[async_trait]
impl TenantQuery<RecordingConnection> for InsertVehicle {
    type Output = i64;

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<i64, DatabaseError> {
        let schema = conn.bound_schema()?;
        let mut state = conn.lock();
        let vehicles = state.vehicles.entry(schema).or_default();
        if vehicles
            .iter()
            .any(|v| v.vehicle_number.search_hash == self.0.vehicle_number.search_hash)
        {
            return Err(DatabaseError::Conflict("vehicle number".to_string()));
        }
        vehicles.push(self.0.clone());
        Ok(vehicles.len() as i64)
    }
}

#[async_trait]
impl TenantQuery<RecordingConnection> for InsertVisit {
    type Output = i64;

    async fn execute(&self, conn: &mut RecordingConnection) -> Result<i64, DatabaseError> {
        let schema = conn.bound_schema()?;
        let mut state = conn.lock();
        let known = state.vehicles.get(&schema).map_or(0, Vec::len) as i64;
        if self.vehicle_id < 1 || self.vehicle_id > known {
            return Err(DatabaseError::NotFound("visit".to_string()));
        }
        let visits = state.visits.entry(schema).or_default();
        if visits.contains(&(self.vehicle_id, self.visit_date)) {
            return Err(DatabaseError::Conflict("visit".to_string()));
        }
        visits.push((self.vehicle_id, self.visit_date));
        Ok(visits.len() as i64)
    }
}

/// A user row whose mobile number and PIN were produced the same way the login path checks them
pub fn user_fixture(
    engine: &crate::crypto::EncryptionEngine,
    id: i64,
    tenant: &str,
    mobile: &str,
    pin: &str,
    role: Role,
) -> User {
    use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};

    let mobile = engine.encrypt_and_hash(mobile).unwrap();
    let salt = SaltString::generate(&mut OsRng);
    let pin_hash = argon2::Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .unwrap()
        .to_string();
    let now = Utc::now();

    User {
        id,
        tenant_id: tenant.to_string(),
        mobile_number: mobile.ciphertext,
        mobile_hash: mobile.search_hash,
        pin_hash,
        role,
        active: true,
        created_at: now,
        updated_at: now,
    }
}
