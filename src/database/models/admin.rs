use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row in `admin_users`: the user with `user_id` is an administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AdminRecord {
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}
