use std::process::ExitCode;

use staffgate::config::{AppConfig, LoggingConfig};
use staffgate::lifecycle::{
    os_notifications, start, Coordinator, Lifecycle, LifecycleError, ShutdownBudget,
};
use staffgate::{build_router, observability, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present so cargo run picks up JWT_SECRET, DATABASE_URL, etc.
    let _ = dotenvy::dotenv();

    if let Err(e) = observability::init_logging(&LoggingConfig::from_env()) {
        eprintln!("{}", e);
        return ExitCode::from(1);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal startup failure");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<(), LifecycleError> {
    let lifecycle = Lifecycle::new();
    let config = AppConfig::from_env()?;
    tracing::info!("Starting staffgate in {:?} mode", config.environment);

    // Register signal handlers before serving so no notice is missed
    let notices = os_notifications().map_err(LifecycleError::Signals)?;

    let started = start(&config, &lifecycle).await?;
    let budget = ShutdownBudget::from_config(&config.server);
    let state = AppState::new(config, &started.database, lifecycle.clone());
    let router = build_router(state);

    let done = Coordinator::new(lifecycle, budget).launch(
        started.listener,
        router,
        started.database.connection,
        notices,
    )?;

    match done.await {
        Ok(completion) => {
            tracing::info!(
                drained = completion.drained,
                connection_closed = completion.connection_closed,
                "staffgate stopped"
            );
        }
        Err(_) => tracing::warn!("shutdown watcher exited without completing"),
    }
    Ok(())
}
