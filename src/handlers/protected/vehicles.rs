use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{ArrivalRecorded, RegisterVehicleRequest, VehicleCreated};

fn acting_user(user: Option<Extension<AuthUser>>) -> Result<i64, ApiError> {
    user.and_then(|Extension(user)| user.user_id)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))
}

/// POST /api/vehicles - register a vehicle on the caller's campus
pub async fn vehicle_post(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Json(request): Json<RegisterVehicleRequest>,
) -> ApiResult<VehicleCreated> {
    let user_id = acting_user(user)?;
    let created = state.vehicles.register(user_id, &request).await?;
    Ok(ApiResponse::with_status(created, StatusCode::CREATED))
}

/// POST /api/vehicles/:id/arrivals - mark today's arrival
pub async fn arrival_post(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Path(vehicle_id): Path<i64>,
) -> ApiResult<ArrivalRecorded> {
    let user_id = acting_user(user)?;
    let recorded = state.vehicles.mark_arrival(user_id, vehicle_id).await?;
    Ok(ApiResponse::with_status(recorded, StatusCode::CREATED))
}
