use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Row in `users`. The password hash never leaves the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload; `password_hash` is already a bcrypt hash
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}
