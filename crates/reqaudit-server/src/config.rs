//! Configuration management

use std::{fmt, str::FromStr, time::Duration};

use http::HeaderName;
use reqaudit_common::env::{env_list, env_opt, env_or};
use serde::{Deserialize, Serialize};

use crate::audit::{
    capture::DEFAULT_MAX_BODY_BYTES,
    middleware::DEFAULT_WRITE_TIMEOUT,
    sweeper::{ScheduleError, SweepSchedule, DEFAULT_SCHEDULE},
    CaptureConfig,
};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

pub const DEFAULT_SERVER_PORT: u16 = 8080;

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// 10 minutes
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

pub const DEFAULT_RETENTION_TIMEZONE: &str = "UTC";

pub const DEFAULT_REDACT_HEADERS: &str = "authorization,proxy-authorization,cookie,set-cookie";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cors: CorsConfig,
    pub audit: AuditConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(format!("unknown store backend '{other}' (expected memory or postgres)")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub max_body_bytes: usize,
    pub write_timeout_ms: u64,
    /// Header set by a trusted proxy with the caller's username
    pub identity_header: Option<String>,
    pub redact_headers: Vec<String>,
}

impl AuditConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn capture_config(&self) -> anyhow::Result<CaptureConfig> {
        let identity_header = self
            .identity_header
            .as_deref()
            .map(HeaderName::from_str)
            .transpose()
            .map_err(|e| anyhow::anyhow!("Invalid AUDIT_IDENTITY_HEADER: {e}"))?;

        let redact_headers = self
            .redact_headers
            .iter()
            .map(|name| {
                HeaderName::from_str(name).map_err(|e| anyhow::anyhow!("Invalid redacted header '{name}': {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(CaptureConfig {
            max_body_bytes: self.max_body_bytes,
            identity_header,
            redact_headers,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub cron: String,
    pub timezone: String,
}

impl RetentionConfig {
    pub fn schedule(&self) -> Result<SweepSchedule, ScheduleError> {
        SweepSchedule::parse(&self.cron, &self.timezone)
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_or("REQAUDIT_HOST", DEFAULT_SERVER_HOST.to_string())?,
                port: env_or("REQAUDIT_PORT", DEFAULT_SERVER_PORT)?,
                shutdown_timeout_secs: env_or("REQAUDIT_SHUTDOWN_TIMEOUT", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?,
            },
            store: StoreConfig {
                backend: env_or("STORE_BACKEND", StoreBackend::Memory)?,
                database: DatabaseConfig {
                    url: env_or("DATABASE_URL", String::new())?,
                    max_connections: env_or("DATABASE_MAX_CONNECTIONS", DEFAULT_DATABASE_MAX_CONNECTIONS)?,
                    min_connections: env_or("DATABASE_MIN_CONNECTIONS", DEFAULT_DATABASE_MIN_CONNECTIONS)?,
                    connect_timeout_secs: env_or(
                        "DATABASE_CONNECT_TIMEOUT",
                        DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    )?,
                    idle_timeout_secs: Some(env_or("DATABASE_IDLE_TIMEOUT", DEFAULT_DATABASE_IDLE_TIMEOUT_SECS)?),
                },
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true)?,
            },
            audit: AuditConfig {
                max_body_bytes: env_or("AUDIT_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
                write_timeout_ms: env_or("AUDIT_WRITE_TIMEOUT_MS", DEFAULT_WRITE_TIMEOUT.as_millis() as u64)?,
                identity_header: env_opt("AUDIT_IDENTITY_HEADER")?,
                redact_headers: env_list("AUDIT_REDACT_HEADERS", DEFAULT_REDACT_HEADERS),
            },
            retention: RetentionConfig {
                enabled: env_or("RETENTION_ENABLED", true)?,
                cron: env_or("RETENTION_CRON", DEFAULT_SCHEDULE.to_string())?,
                timezone: env_or("RETENTION_TIMEZONE", DEFAULT_RETENTION_TIMEZONE.to_string())?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.store.backend == StoreBackend::Postgres {
            let database = &self.store.database;
            if database.url.is_empty() {
                anyhow::bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
            }

            if database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if database.min_connections > database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    database.min_connections,
                    database.max_connections
                );
            }
        }

        if self.audit.write_timeout_ms == 0 {
            anyhow::bail!("AUDIT_WRITE_TIMEOUT_MS must be greater than 0");
        }

        self.audit.capture_config()?;
        self.retention.schedule()?;

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            store: StoreConfig {
                backend: StoreBackend::Memory,
                database: DatabaseConfig {
                    url: String::new(),
                    max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                    min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                    connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    idle_timeout_secs: Some(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                },
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            audit: AuditConfig {
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
                write_timeout_ms: DEFAULT_WRITE_TIMEOUT.as_millis() as u64,
                identity_header: None,
                redact_headers: DEFAULT_REDACT_HEADERS.split(',').map(str::to_string).collect(),
            },
            retention: RetentionConfig {
                enabled: true,
                cron: DEFAULT_SCHEDULE.to_string(),
                timezone: DEFAULT_RETENTION_TIMEZONE.to_string(),
            },
        }
    }
}
