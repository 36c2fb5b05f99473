use axum::extract::{Query, State};
use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::MultiCampusDashboard;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

/// GET /api/admin/dashboard?date=YYYY-MM-DD - arrivals across every campus
pub async fn dashboard_get(
    State(state): State<AppState>,
    user: Option<Extension<AuthUser>>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<MultiCampusDashboard> {
    let Some(Extension(user)) = user else {
        return Err(ApiError::unauthorized("Missing Authorization header"));
    };
    user.require_admin()?;

    let date = query
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let dashboard = state.dashboard.multi_campus_dashboard(date).await;
    Ok(ApiResponse::success(dashboard))
}
