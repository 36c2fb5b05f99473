use axum::{extract::State, Json};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{LoginRequest, LoginResponse};

/// POST /api/auth/login - campus code, mobile number and PIN in, tokens out
pub async fn login_post(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = state.auth.login(&request).await?;
    Ok(ApiResponse::success(response))
}
