pub mod memory;
pub mod models;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseConfig, StorageBackend};

pub use memory::MemoryDatabase;
pub use models::admin::AdminRecord;
pub use models::user::{NewUser, UserRecord};
pub use postgres::PgDatabase;

/// Errors from the privilege store and the shared connection
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database connection is closed")]
    Closed,

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolClosed => StoreError::Closed,
            sqlx::Error::PoolTimedOut => StoreError::Unavailable("pool timed out".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

/// Administrator records, queried on every gate evaluation.
///
/// Handlers and gates only ever see this interface. `NotFound` is the
/// distinguishable "not an administrator" answer; every other error is a
/// lookup failure.
#[async_trait]
pub trait PrivilegeStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError>;

    async fn create_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError>;

    async fn delete_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError>;
}

/// Accounts created at registration and read back at login
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `Conflict` when the email or username is taken
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn get_user_by_username(&self, username: &str) -> Result<UserRecord, StoreError>;
}

/// Teardown side of the shared connection. Held only by the lifecycle
/// coordinator.
#[async_trait]
pub trait SharedConnection: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn close(&self) -> Result<(), StoreError>;
}

/// The one connection, split into its request-facing and teardown halves
#[derive(Clone)]
pub struct Database {
    pub privileges: Arc<dyn PrivilegeStore>,
    pub users: Arc<dyn UserStore>,
    pub connection: Arc<dyn SharedConnection>,
}

impl Database {
    pub fn from_shared<T>(backend: Arc<T>) -> Self
    where
        T: PrivilegeStore + UserStore + SharedConnection + 'static,
    {
        Self {
            privileges: backend.clone(),
            users: backend.clone(),
            connection: backend,
        }
    }

    /// Establish the shared connection for the configured backend
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        match config.backend {
            StorageBackend::Postgres => {
                let pg = PgDatabase::connect(config).await?;
                Ok(Self::from_shared(Arc::new(pg)))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory privilege store; records are not persisted");
                Ok(Self::from_shared(Arc::new(MemoryDatabase::new())))
            }
        }
    }
}
