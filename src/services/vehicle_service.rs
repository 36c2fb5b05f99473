use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::audit_service::AuditLogger;
use crate::crypto::{CryptoError, EncryptionEngine};
use crate::database::models::{AuditAction, NewVehicle, VehicleType};
use crate::database::repository::{InsertAuditLog, InsertVehicle, InsertVisit};
use crate::database::{ConnectionSource, DatabaseError, TenantQuery, UnitOfWork};

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("Owner name is required")]
    MissingOwnerName,

    #[error("Vehicle number is required")]
    MissingVehicleNumber,

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterVehicleRequest {
    pub owner_name: String,
    pub owner_mobile: String,
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleCreated {
    pub id: i64,
    /// Normalised plate, as stored (encrypted) and hashed
    pub vehicle_number: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArrivalRecorded {
    pub visit_id: i64,
    pub vehicle_id: i64,
    pub visit_date: NaiveDate,
}

/// Vehicle registration and gate arrivals for the campus in the current tenant marker
pub struct VehicleService<S> {
    unit_of_work: UnitOfWork<S>,
    encryption: Arc<EncryptionEngine>,
    audit: AuditLogger<S>,
}

impl<S> VehicleService<S>
where
    S: ConnectionSource,
    InsertVehicle: TenantQuery<S::Connection, Output = i64>,
    InsertVisit: TenantQuery<S::Connection, Output = i64>,
    InsertAuditLog: TenantQuery<S::Connection, Output = ()>,
{
    pub fn new(
        unit_of_work: UnitOfWork<S>,
        encryption: Arc<EncryptionEngine>,
        audit: AuditLogger<S>,
    ) -> Self {
        Self {
            unit_of_work,
            encryption,
            audit,
        }
    }

    /// Encrypt both PII fields and insert. A plate already registered on this campus
    /// (same hash) is a `Conflict`.
    pub async fn register(
        &self,
        created_by_id: i64,
        request: &RegisterVehicleRequest,
    ) -> Result<VehicleCreated, VehicleError> {
        if request.owner_name.trim().is_empty() {
            return Err(VehicleError::MissingOwnerName);
        }
        if request.vehicle_number.trim().is_empty() {
            return Err(VehicleError::MissingVehicleNumber);
        }

        let vehicle = NewVehicle::encrypt(
            &self.encryption,
            request.owner_name.trim(),
            &request.owner_mobile,
            &request.vehicle_number,
            request.vehicle_type,
            created_by_id,
        )?;
        let id = self
            .unit_of_work
            .transaction(&InsertVehicle(vehicle), false)
            .await?;

        info!("Vehicle {} registered by user {}", id, created_by_id);
        self.audit.record(
            InsertAuditLog::new(Some(created_by_id), AuditAction::CreateVehicle)
                .with_entity("VEHICLE", id),
        );

        Ok(VehicleCreated {
            id,
            vehicle_number: NewVehicle::normalize_number(&request.vehicle_number),
            vehicle_type: request.vehicle_type,
        })
    }

    /// Record today's arrival. A second arrival on the same day is a `Conflict`.
    pub async fn mark_arrival(
        &self,
        marked_by_id: i64,
        vehicle_id: i64,
    ) -> Result<ArrivalRecorded, VehicleError> {
        let now = Local::now().naive_local();
        let visit = InsertVisit {
            vehicle_id,
            visit_date: now.date(),
            arrived_at: now,
            marked_by_id,
        };
        let visit_id = self.unit_of_work.transaction(&visit, false).await?;

        info!("Arrival of vehicle {} marked by user {}", vehicle_id, marked_by_id);
        self.audit.record(
            InsertAuditLog::new(Some(marked_by_id), AuditAction::MarkArrival)
                .with_entity("VISIT", visit_id),
        );

        Ok(ArrivalRecorded {
            visit_id,
            vehicle_id,
            visit_date: visit.visit_date,
        })
    }
}
