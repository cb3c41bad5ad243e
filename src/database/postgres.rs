use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use super::{
    AdminRecord, NewUser, PrivilegeStore, SharedConnection, StoreError, UserRecord, UserStore,
};
use crate::config::DatabaseConfig;

const PING_TIMEOUT: Duration = Duration::from_secs(1);

/// Postgres-backed privilege store over a single shared pool
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Open the pool and confirm the server answers
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&config.url)
            .await?;

        let db = Self { pool };
        db.ping().await?;

        info!(
            max_connections = config.max_connections,
            "Successfully connected to the database"
        );
        Ok(db)
    }
}

#[async_trait]
impl PrivilegeStore for PgDatabase {
    async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::timeout(PING_TIMEOUT, sqlx::query("SELECT 1").execute(&self.pool))
            .await
            .map_err(|_| StoreError::Unavailable("ping timed out".to_string()))??;
        Ok(())
    }

    async fn get_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        sqlx::query_as::<_, AdminRecord>(
            "SELECT user_id, created_at FROM admin_users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn create_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        let record = sqlx::query_as::<_, AdminRecord>(
            "INSERT INTO admin_users (user_id) VALUES ($1) RETURNING user_id, created_at",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete_admin(&self, user_id: i64) -> Result<AdminRecord, StoreError> {
        sqlx::query_as::<_, AdminRecord>(
            "DELETE FROM admin_users WHERE user_id = $1 RETURNING user_id, created_at",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for PgDatabase {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) \
             RETURNING id, email, username, password_hash, created_at",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SharedConnection for PgDatabase {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.pool.is_closed() {
            return Err(StoreError::Closed);
        }
        self.pool.close().await;
        info!("Closed database pool");
        Ok(())
    }
}
