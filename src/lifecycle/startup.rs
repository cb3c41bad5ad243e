use tokio::net::TcpListener;
use tracing::{error, info};

use super::{Lifecycle, LifecycleError, LifecycleState};
use crate::config::AppConfig;
use crate::database::Database;

/// Resources acquired during startup, handed to the coordinator
pub struct Started {
    pub database: Database,
    pub listener: TcpListener,
}

/// `Init -> Starting`, then connect to the database and bind the listener.
///
/// Either failure is fatal. A bind failure closes the connection opened
/// before it.
pub async fn start(config: &AppConfig, lifecycle: &Lifecycle) -> Result<Started, LifecycleError> {
    lifecycle.advance(LifecycleState::Starting)?;

    let database = Database::connect(&config.database)
        .await
        .map_err(LifecycleError::Connect)?;
    info!(
        backend = database.connection.backend_name(),
        "database connected"
    );

    let addr = config.server.bind_addr();
    let listener = match TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(source) => {
            if let Err(e) = database.connection.close().await {
                error!(error = %e, "failed to close database after bind failure");
            }
            return Err(LifecycleError::Bind { addr, source });
        }
    };

    Ok(Started { database, listener })
}
