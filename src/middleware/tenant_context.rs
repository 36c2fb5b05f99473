use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use super::auth::{extract_bearer_token, AuthUser};
use crate::app::AppState;
use crate::error::ApiError;
use crate::tenancy::{TenantMarker, TenantId};

/// Establishes the tenant marker for one request.
///
/// A valid bearer token sets the marker to its campus claim and attaches an `AuthUser`;
/// the marker is cleared when the response is produced, whatever happened. A request
/// without a token runs with no marker. A bad token is rejected with 401.
pub async fn tenant_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers()).map_err(ApiError::unauthorized)?;

    let Some(token) = token else {
        return Ok(TenantMarker::scope(next.run(request)).await);
    };

    let claims = state.tokens.verify_access_token(&token)?;

    let tenant: TenantId = match state.allow_list.tenant(&claims.tenant_id) {
        Some(tenant) => tenant.clone(),
        None => {
            warn!("Token names unknown tenant: {:?}", claims.tenant_id);
            return Err(ApiError::unauthorized("Invalid or expired token"));
        }
    };

    debug!("Tenant context from token: {}", tenant);
    request.extensions_mut().insert(AuthUser::from(claims));

    Ok(TenantMarker::scope(async move {
        let _clear = TenantMarker::clear_on_exit();
        TenantMarker::set(tenant);
        next.run(request).await
    })
    .await)
}
