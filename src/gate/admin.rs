use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use super::{Gate, GateDenial, GateScope};
use crate::database::{PrivilegeStore, StoreError};

/// Passes when the caller has a row in `admin_users`. Queried on every
/// request; a revoked administrator is denied on the next one.
pub struct AdministratorGate {
    store: Arc<dyn PrivilegeStore>,
}

impl AdministratorGate {
    pub fn new(store: Arc<dyn PrivilegeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Gate for AdministratorGate {
    fn name(&self) -> &'static str {
        "administrator"
    }

    async fn check(&self, scope: &GateScope<'_>) -> Result<(), GateDenial> {
        let identity = scope.identity().ok_or(GateDenial::Unauthenticated)?;

        match self.store.get_admin(identity.id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(GateDenial::InsufficientPrivilege),
            Err(err) => {
                error!(user_id = identity.id, error = %err, "privilege lookup failed");
                Err(GateDenial::PrivilegeLookupFailed)
            }
        }
    }
}
