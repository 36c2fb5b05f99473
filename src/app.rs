use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::crypto::EncryptionEngine;
use crate::database::{ConnectionRouter, UnitOfWork};
use crate::handlers;
use crate::middleware::tenant_context;
use crate::services::{AuditLogger, AuthService, DashboardService, VehicleService};
use crate::tenancy::{AllowList, TenantAwareExecutor};

/// Everything a request handler can reach
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub allow_list: Arc<AllowList>,
    pub tokens: TokenIssuer,
    pub auth: Arc<AuthService<PgPool>>,
    pub dashboard: Arc<DashboardService<PgPool>>,
    pub vehicles: Arc<VehicleService<PgPool>>,
}

impl AppState {
    /// Wire services over the shared pool. Fails on a bad allow-list, encryption key or
    /// JWT secret, so misconfiguration stops startup.
    pub fn build(
        config: &AppConfig,
        pool: PgPool,
        executor: Arc<TenantAwareExecutor>,
    ) -> anyhow::Result<Self> {
        let allow_list = Arc::new(AllowList::from_config(&config.tenancy)?);
        let encryption = Arc::new(EncryptionEngine::from_config(&config.encryption)?);
        let tokens = TokenIssuer::from_config(&config.security)?;

        let router = Arc::new(ConnectionRouter::new(pool.clone(), allow_list.clone()));
        let unit_of_work = UnitOfWork::new(router);
        let audit = AuditLogger::new(executor, unit_of_work.clone());

        Ok(Self {
            pool,
            allow_list,
            tokens: tokens.clone(),
            auth: Arc::new(AuthService::new(
                unit_of_work.clone(),
                encryption.clone(),
                tokens,
                audit.clone(),
            )),
            vehicles: Arc::new(VehicleService::new(
                unit_of_work.clone(),
                encryption,
                audit,
            )),
            dashboard: Arc::new(DashboardService::new(unit_of_work)),
        })
    }
}

pub fn app(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::public::auth::login_post))
        .route("/api/vehicles", post(handlers::protected::vehicles::vehicle_post))
        .route(
            "/api/vehicles/:id/arrivals",
            post(handlers::protected::vehicles::arrival_post),
        )
        .route(
            "/api/admin/dashboard",
            get(handlers::elevated::admin::dashboard_get),
        )
        .layer(from_fn_with_state(state.clone(), tenant_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
