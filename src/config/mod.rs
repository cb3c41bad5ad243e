use std::env;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// One year; keeps the credential lifetime well inside `chrono::Duration`
pub const MAX_JWT_EXPIRY_HOURS: u64 = 24 * 366;
pub const MIN_BCRYPT_COST: u32 = 4;
pub const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub drain_timeout_secs: u64,
    pub close_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    /// Resolved connection string (from DATABASE_URL or the DB_* parts)
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    /// Work factor for password hashes written at registration
    pub bcrypt_cost: u32,
    pub supreme_leader_secret: String,
    /// Empty means any http(s) origin
    pub cors_origins: Vec<String>,
}

impl SecurityConfig {
    /// Lifetime of issued credentials. `validate` bounds the hours, the clamp
    /// keeps hand-built configs inside `chrono::Duration` as well.
    pub fn credential_ttl(&self) -> chrono::Duration {
        let hours = self.jwt_expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS);
        chrono::Duration::hours(i64::try_from(hours).unwrap_or(1))
    }
}

/// Read separately from `AppConfig` so the logger exists before anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Disabled,
}

#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_value(env::var("LOG_ENV").ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        let format = match value.unwrap_or("development") {
            "production" => LogFormat::Json,
            "development" => LogFormat::Pretty,
            _ => LogFormat::Disabled,
        };
        Self { format }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup (the process environment in
    /// production, a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };
        config.apply_overrides(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        override_parsed(lookup, "PORT", &mut self.server.port)?;
        override_parsed(
            lookup,
            "SERVER_DRAIN_TIMEOUT_SECS",
            &mut self.server.drain_timeout_secs,
        )?;
        override_parsed(
            lookup,
            "SERVER_CLOSE_TIMEOUT_SECS",
            &mut self.server.close_timeout_secs,
        )?;
        override_parsed(lookup, "SERVER_MAX_BODY_BYTES", &mut self.server.max_body_bytes)?;

        // Database overrides
        if let Some(v) = lookup("STORAGE_BACKEND") {
            self.database.backend = match v.as_str() {
                "postgres" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STORAGE_BACKEND",
                        value: v,
                    })
                }
            };
        }
        override_parsed(
            lookup,
            "DATABASE_MAX_CONNECTIONS",
            &mut self.database.max_connections,
        )?;
        override_parsed(
            lookup,
            "DATABASE_CONNECTION_TIMEOUT",
            &mut self.database.connection_timeout,
        )?;
        self.database.url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => build_database_url(lookup)?,
        };

        // API overrides
        override_parsed(
            lookup,
            "API_ENABLE_RATE_LIMITING",
            &mut self.api.enable_rate_limiting,
        )?;
        override_parsed(
            lookup,
            "API_RATE_LIMIT_REQUESTS",
            &mut self.api.rate_limit_requests,
        )?;
        override_parsed(
            lookup,
            "API_RATE_LIMIT_WINDOW_SECS",
            &mut self.api.rate_limit_window_secs,
        )?;

        // Security overrides
        if let Some(v) = lookup("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        override_parsed(
            lookup,
            "SECURITY_JWT_EXPIRY_HOURS",
            &mut self.security.jwt_expiry_hours,
        )?;
        override_parsed(lookup, "SECURITY_BCRYPT_COST", &mut self.security.bcrypt_cost)?;
        if let Some(v) = lookup("SUPREME_LEADER_SECRET_KEY") {
            self.security.supreme_leader_secret = v;
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        // An empty configured secret would let an empty body value through
        if self.security.supreme_leader_secret.is_empty() {
            return Err(ConfigError::Missing("SUPREME_LEADER_SECRET_KEY"));
        }
        if self.api.rate_limit_requests == 0 {
            return Err(ConfigError::Invalid {
                key: "API_RATE_LIMIT_REQUESTS",
                value: "0".to_string(),
            });
        }
        if self.api.rate_limit_window_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "API_RATE_LIMIT_WINDOW_SECS",
                value: "0".to_string(),
            });
        }
        if !(1..=MAX_JWT_EXPIRY_HOURS).contains(&self.security.jwt_expiry_hours) {
            return Err(ConfigError::Invalid {
                key: "SECURITY_JWT_EXPIRY_HOURS",
                value: self.security.jwt_expiry_hours.to_string(),
            });
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.security.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "SECURITY_BCRYPT_COST",
                value: self.security.bcrypt_cost.to_string(),
            });
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                port: 8080,
                drain_timeout_secs: 10,
                close_timeout_secs: 1,
                max_body_bytes: 64 * 1024,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Postgres,
                url: String::new(),
                max_connections: 5,
                connection_timeout: 30,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 10,
                rate_limit_window_secs: 60,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                bcrypt_cost: bcrypt::DEFAULT_COST,
                supreme_leader_secret: String::new(),
                cors_origins: Vec::new(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout: 10,
                ..Self::development().database
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout: 5,
                ..Self::development().database
            },
            security: SecurityConfig {
                jwt_expiry_hours: 4,
                ..Self::development().security
            },
            ..Self::development()
        }
    }
}

/// Replace `slot` with the parsed value of `key` when it is set. A value that
/// does not parse is an error, never a silent fallback to the preset.
fn override_parsed<T, F>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(key) {
        *slot = v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v })?;
    }
    Ok(())
}

/// Assemble a postgres URL from DB_HOST, DB_PORT, DB_USER, DB_PASSWORD,
/// DB_NAME and DB_SSLMODE
fn build_database_url<F>(lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
    let port = match lookup("DB_PORT") {
        Some(v) => v.parse::<u16>().map_err(|_| ConfigError::Invalid {
            key: "DB_PORT",
            value: v,
        })?,
        None => 5432,
    };
    let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
    let password = lookup("DB_PASSWORD").unwrap_or_default();
    let name = lookup("DB_NAME").unwrap_or_else(|| "staffgate".to_string());
    let sslmode = lookup("DB_SSLMODE").unwrap_or_else(|| "disable".to_string());

    let invalid = || ConfigError::InvalidDatabaseUrl(format!("host={} port={}", host, port));
    let mut url = url::Url::parse("postgres://localhost").map_err(|_| invalid())?;
    url.set_host(Some(&host)).map_err(|_| invalid())?;
    url.set_port(Some(port)).map_err(|_| invalid())?;
    url.set_username(&user).map_err(|_| invalid())?;
    if !password.is_empty() {
        url.set_password(Some(&password)).map_err(|_| invalid())?;
    }
    url.set_path(&format!("/{}", name));
    url.query_pairs_mut().append_pair("sslmode", &sslmode);
    Ok(url.into())
}

// Secrets never reach the logs
impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_expiry_hours", &self.jwt_expiry_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("supreme_leader_secret", &"<redacted>")
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = match url::Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                let _ = url.set_password(Some("<redacted>"));
                url.to_string()
            }
            _ => self.url.clone(),
        };
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("url", &url)
            .field("max_connections", &self.max_connections)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}
