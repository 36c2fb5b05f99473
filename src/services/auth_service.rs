use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::audit_service::AuditLogger;
use crate::auth::{AuthError, TokenIssuer};
use crate::crypto::EncryptionEngine;
use crate::database::models::{AuditAction, Role, User};
use crate::database::repository::{InsertAuditLog, UserByMobileHash};
use crate::database::{ConnectionSource, TenantQuery, UnitOfWork};
use crate::tenancy::{AllowList, TenancyError, TenantId, TenantMarker};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub tenant_id: String,
    pub mobile_number: String,
    pub pin: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: i64,
    /// Decrypted for display
    pub mobile_number: String,
    pub role: Role,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Seconds
    pub expires_in: i64,
    pub user: UserInfo,
}

pub struct AuthService<S> {
    allow_list: Arc<AllowList>,
    unit_of_work: UnitOfWork<S>,
    encryption: Arc<EncryptionEngine>,
    tokens: TokenIssuer,
    audit: AuditLogger<S>,
}

impl<S> AuthService<S>
where
    S: ConnectionSource,
    UserByMobileHash: TenantQuery<S::Connection, Output = Option<User>>,
    InsertAuditLog: TenantQuery<S::Connection, Output = ()>,
{
    pub fn new(
        unit_of_work: UnitOfWork<S>,
        encryption: Arc<EncryptionEngine>,
        tokens: TokenIssuer,
        audit: AuditLogger<S>,
    ) -> Self {
        let allow_list = Arc::new(unit_of_work.router().allow_list().clone());
        Self {
            allow_list,
            unit_of_work,
            encryption,
            tokens,
            audit,
        }
    }

    /// Authenticate against the named campus.
    ///
    /// The campus code must be one of the configured tenants (never the default schema).
    /// The marker is set for the duration of the login in its own scope and cleared on
    /// every exit path.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let tenant = self
            .allow_list
            .tenant(&request.tenant_id)
            .cloned()
            .ok_or_else(|| TenancyError::UnknownTenant(request.tenant_id.clone()))?;

        TenantMarker::scope(async {
            let _clear = TenantMarker::clear_on_exit();
            TenantMarker::set(tenant.clone());
            self.login_within(&tenant, request).await
        })
        .await
    }

    async fn login_within(
        &self,
        tenant: &TenantId,
        request: &LoginRequest,
    ) -> Result<LoginResponse, AuthError> {
        let lookup = UserByMobileHash {
            mobile_hash: self.encryption.hash(&request.mobile_number),
            tenant_id: tenant.to_string(),
        };

        let user = self
            .unit_of_work
            .run(&lookup)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.active {
            return Err(AuthError::AccountInactive);
        }

        let parsed = PasswordHash::new(&user.pin_hash).map_err(|e| {
            warn!("Stored PIN hash for user {} is unreadable: {}", user.id, e);
            AuthError::InvalidCredentials
        })?;
        Argon2::default()
            .verify_password(request.pin.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let access_token = self.tokens.issue_access_token(&user)?;
        let refresh_token = self.tokens.issue_refresh_token(&user)?;
        let mobile_number = self.encryption.decrypt(&user.mobile_number)?;

        info!(
            "User logged in: {} with role: {} for tenant: {}",
            user.id,
            user.role.as_str(),
            user.tenant_id
        );

        self.audit.log(Some(user.id), AuditAction::Login);

        Ok(LoginResponse {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.tokens.access_token_expiry_secs(),
            user: UserInfo {
                id: user.id,
                mobile_number,
                role: user.role,
                tenant_id: user.tenant_id,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::database::ConnectionRouter;
    use crate::tenancy::TenantAwareExecutor;
    use crate::testing::{user_fixture, RecordingSource};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    struct Harness {
        service: AuthService<RecordingSource>,
        executor: Arc<TenantAwareExecutor>,
    }

    impl Harness {
        fn new(source: RecordingSource) -> Self {
            let allow_list = AllowList::new(["east", "west", "north", "south"], "public").unwrap();
            let router = ConnectionRouter::new(source, Arc::new(allow_list));
            let unit_of_work = UnitOfWork::new(Arc::new(router));
            let executor = Arc::new(TenantAwareExecutor::start(&WorkerConfig {
                pool_size: 1,
                queue_capacity: 8,
            }));
            let audit = AuditLogger::new(executor.clone(), unit_of_work.clone());
            let service = AuthService::new(
                unit_of_work,
                Arc::new(EncryptionEngine::new(KEY).unwrap()),
                TokenIssuer::new("test-secret", 900, 3600).unwrap(),
                audit,
            );
            Self { service, executor }
        }

        async fn finish(self) {
            drop(self.service);
            match Arc::try_unwrap(self.executor) {
                Ok(executor) => executor.shutdown().await,
                Err(_) => panic!("executor still shared"),
            }
        }
    }

    fn request(tenant: &str, mobile: &str, pin: &str) -> LoginRequest {
        LoginRequest {
            tenant_id: tenant.to_string(),
            mobile_number: mobile.to_string(),
            pin: pin.to_string(),
        }
    }

    fn source_with_east_user() -> RecordingSource {
        let engine = EncryptionEngine::new(KEY).unwrap();
        RecordingSource::new().with_user(
            "east",
            user_fixture(&engine, 11, "east", "9876543210", "123456", Role::Staff),
        )
    }

    #[tokio::test]
    async fn login_looks_up_in_campus_schema_and_clears_marker() {
        let source = source_with_east_user();
        let harness = Harness::new(source.clone());

        let (response, after) = TenantMarker::scope(async {
            let response = harness
                .service
                .login(&request("east", "9876543210", "123456"))
                .await;
            (response, TenantMarker::get())
        })
        .await;
        harness.finish().await;

        let response = response.unwrap();
        assert_eq!(response.user.id, 11);
        assert_eq!(response.user.mobile_number, "9876543210");
        assert_eq!(response.user.tenant_id, "east");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(after, None);

        assert_eq!(source.statements()[0], "SET search_path TO \"east\"");
        assert_eq!(
            source.audit_entries(),
            vec![("east".to_string(), Some(11), "LOGIN".to_string())]
        );
    }

    #[tokio::test]
    async fn wrong_pin_is_rejected_and_marker_cleared() {
        let harness = Harness::new(source_with_east_user());

        let (result, after) = TenantMarker::scope(async {
            let result = harness
                .service
                .login(&request("east", "9876543210", "000000"))
                .await;
            (result, TenantMarker::get())
        })
        .await;
        harness.finish().await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(after, None);
    }

    #[tokio::test]
    async fn user_from_other_campus_is_not_found() {
        let source = source_with_east_user();
        let harness = Harness::new(source.clone());

        let result = harness
            .service
            .login(&request("west", "9876543210", "123456"))
            .await;
        harness.finish().await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(source.statements()[0], "SET search_path TO \"west\"");
        assert!(source.audit_entries().is_empty());
    }

    #[tokio::test]
    async fn default_schema_and_unknown_codes_are_refused() {
        let source = source_with_east_user();
        let harness = Harness::new(source.clone());

        for code in ["public", "pg_catalog", "East"] {
            let result = harness
                .service
                .login(&request(code, "9876543210", "123456"))
                .await;
            assert!(matches!(
                result,
                Err(AuthError::Tenancy(TenancyError::UnknownTenant(_)))
            ));
        }
        harness.finish().await;

        assert_eq!(source.acquired(), 0);
    }

    #[tokio::test]
    async fn inactive_user_is_refused() {
        let engine = EncryptionEngine::new(KEY).unwrap();
        let mut user = user_fixture(&engine, 12, "south", "9000000000", "654321", Role::Admin);
        user.active = false;
        let harness = Harness::new(RecordingSource::new().with_user("south", user));

        let result = harness
            .service
            .login(&request("south", "9000000000", "654321"))
            .await;
        harness.finish().await;

        assert!(matches!(result, Err(AuthError::AccountInactive)));
    }
}
