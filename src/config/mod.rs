use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub tenancy: TenancyConfig,
    pub encryption: EncryptionConfig,
    pub security: SecurityConfig,
    pub worker: WorkerConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// Fixed campus set; each entry is a Postgres schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenancyConfig {
    pub schemas: Vec<String>,
    pub default_schema: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    #[serde(skip_serializing)]
    pub secret_key: String,
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    pub enable_cors: bool,
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("refresh_token_expiry_secs", &self.refresh_token_expiry_secs)
            .field("enable_cors", &self.enable_cors)
            .finish()
    }
}

/// Background executor sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub pool_size: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Tenancy overrides
        if let Ok(v) = env::var("TENANT_SCHEMAS") {
            self.tenancy.schemas = split_list(&v);
        }
        if let Ok(v) = env::var("TENANT_DEFAULT_SCHEMA") {
            self.tenancy.default_schema = v.trim().to_string();
        }

        // Encryption overrides
        if let Ok(v) = env::var("ENCRYPTION_SECRET_KEY") {
            self.encryption.secret_key = v;
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_TOKEN_EXPIRY_SECS") {
            self.security.access_token_expiry_secs = v.parse().unwrap_or(self.security.access_token_expiry_secs);
        }
        if let Ok(v) = env::var("JWT_REFRESH_TOKEN_EXPIRY_SECS") {
            self.security.refresh_token_expiry_secs = v.parse().unwrap_or(self.security.refresh_token_expiry_secs);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        // Worker overrides
        if let Ok(v) = env::var("WORKER_POOL_SIZE") {
            self.worker.pool_size = v.parse().unwrap_or(self.worker.pool_size);
        }
        if let Ok(v) = env::var("WORKER_QUEUE_CAPACITY") {
            self.worker.queue_capacity = v.parse().unwrap_or(self.worker.queue_capacity);
        }

        // API overrides
        if let Some(port) = env::var("CAMPUS_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse().ok())
        {
            self.api.port = port;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            tenancy: TenancyConfig::default(),
            encryption: EncryptionConfig {
                secret_key: String::new(),
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_expiry_secs: 24 * 60 * 60, // 1 day
                refresh_token_expiry_secs: 7 * 24 * 60 * 60,
                enable_cors: true,
            },
            worker: WorkerConfig::default(),
            api: ApiConfig { port: 8080 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_expiry_secs: 60 * 60,
                refresh_token_expiry_secs: 7 * 24 * 60 * 60,
                enable_cors: true,
            },
            ..Self::development()
        }
        .with_environment(Environment::Staging)
    }

    fn production() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                access_token_expiry_secs: 15 * 60,
                refresh_token_expiry_secs: 24 * 60 * 60,
                enable_cors: false,
            },
            worker: WorkerConfig {
                pool_size: 10,
                queue_capacity: 100,
            },
            ..Self::development()
        }
        .with_environment(Environment::Production)
    }

    fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            schemas: ["east", "west", "north", "south"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_schema: "public".to_string(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: 5,
            queue_capacity: 100,
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
