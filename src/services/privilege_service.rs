use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::database::{PrivilegeStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Granted,
    Revoked,
}

pub struct PrivilegeService {
    store: Arc<dyn PrivilegeStore>,
}

impl PrivilegeService {
    pub fn new(store: Arc<dyn PrivilegeStore>) -> Self {
        Self { store }
    }

    /// Flip administrator status for `user_id`.
    ///
    /// Not atomic: two concurrent toggles for the same user can race, and the
    /// loser gets `Conflict` instead of a silent double flip.
    pub async fn toggle_admin(&self, user_id: i64) -> Result<ToggleOutcome, StoreError> {
        match self.store.get_admin(user_id).await {
            // A concurrent grant surfaces as Conflict from the insert
            Err(StoreError::NotFound) => {
                self.store.create_admin(user_id).await?;
                info!(user_id, "granted administrator privilege");
                Ok(ToggleOutcome::Granted)
            }
            Ok(_) => match self.store.delete_admin(user_id).await {
                Ok(_) => {
                    info!(user_id, "revoked administrator privilege");
                    Ok(ToggleOutcome::Revoked)
                }
                Err(StoreError::NotFound) => Err(StoreError::Conflict(format!(
                    "administrator record for user {} changed concurrently",
                    user_id
                ))),
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}
