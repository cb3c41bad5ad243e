use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::{Lifecycle, LifecycleError, LifecycleState, ShutdownNotice};
use crate::config::ServerConfig;
use crate::database::SharedConnection;

/// Upper bounds on each teardown step
#[derive(Debug, Clone, Copy)]
pub struct ShutdownBudget {
    pub drain_timeout: Duration,
    pub close_timeout: Duration,
}

impl ShutdownBudget {
    pub fn from_config(server: &ServerConfig) -> Self {
        Self {
            drain_timeout: server.drain_timeout(),
            close_timeout: server.close_timeout(),
        }
    }
}

/// Published once, after the connection close step has returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// In-flight requests finished inside the drain budget
    pub drained: bool,
    /// The shared connection reported a clean close
    pub connection_closed: bool,
}

pub struct Coordinator {
    lifecycle: Lifecycle,
    budget: ShutdownBudget,
}

impl Coordinator {
    pub fn new(lifecycle: Lifecycle, budget: ShutdownBudget) -> Self {
        Self { lifecycle, budget }
    }

    /// Start serving on `listener` and arm the shutdown watcher.
    ///
    /// The first notice from `notices` starts teardown; later ones are
    /// logged and ignored. The returned receiver yields exactly one
    /// `Completion`. If `notices` closes before delivering anything, the
    /// watcher exits and no completion is published.
    pub fn launch(
        self,
        listener: TcpListener,
        router: Router,
        connection: Arc<dyn SharedConnection>,
        notices: mpsc::Receiver<ShutdownNotice>,
    ) -> Result<oneshot::Receiver<Completion>, LifecycleError> {
        self.lifecycle.advance(LifecycleState::Serving)?;

        // Drain trigger, separate from the notice channel
        let (drain_tx, mut drain_rx) = watch::channel(false);
        let local_addr = listener.local_addr().ok();
        let serve = tokio::spawn(async move {
            let drain = async move {
                let _ = drain_rx.wait_for(|draining| *draining).await;
            };
            let service = router.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service)
                .with_graceful_shutdown(drain)
                .await
            {
                error!(error = %e, "server loop exited with error");
            }
        });
        if let Some(addr) = local_addr {
            info!(%addr, "listening");
        }

        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(watch_for_shutdown(
            self.lifecycle,
            self.budget,
            notices,
            serve,
            drain_tx,
            connection,
            done_tx,
        ));

        Ok(done_rx)
    }
}

async fn watch_for_shutdown(
    lifecycle: Lifecycle,
    budget: ShutdownBudget,
    mut notices: mpsc::Receiver<ShutdownNotice>,
    serve: JoinHandle<()>,
    drain_tx: watch::Sender<bool>,
    connection: Arc<dyn SharedConnection>,
    done_tx: oneshot::Sender<Completion>,
) {
    let Some(first) = notices.recv().await else {
        warn!("shutdown notice source closed without a notice");
        return;
    };
    info!(signal = %first, "shutdown requested");
    if let Err(e) = lifecycle.advance(LifecycleState::ShuttingDown) {
        error!(error = %e, "unexpected lifecycle state at shutdown");
    }

    let teardown = teardown(budget, serve, drain_tx, connection);
    tokio::pin!(teardown);
    let completion = loop {
        tokio::select! {
            completion = &mut teardown => break completion,
            Some(extra) = notices.recv() => {
                warn!(signal = %extra, "shutdown already in progress; ignoring notice");
            }
        }
    };

    if let Err(e) = lifecycle.advance(LifecycleState::Stopped) {
        error!(error = %e, "unexpected lifecycle state after teardown");
    }
    info!(
        drained = completion.drained,
        connection_closed = completion.connection_closed,
        "shutdown complete"
    );
    // A dropped receiver only means nobody is waiting any more
    let _ = done_tx.send(completion);
}

/// Drain, then close. Close runs even when the drain budget is exceeded.
async fn teardown(
    budget: ShutdownBudget,
    mut serve: JoinHandle<()>,
    drain_tx: watch::Sender<bool>,
    connection: Arc<dyn SharedConnection>,
) -> Completion {
    drain_tx.send_replace(true);

    let drained = match timeout(budget.drain_timeout, &mut serve).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(error = %e, "server task failed during drain");
            false
        }
        Err(_) => {
            warn!(
                timeout_ms = budget.drain_timeout.as_millis() as u64,
                "drain timed out; aborting in-flight requests"
            );
            serve.abort();
            false
        }
    };

    let backend = connection.backend_name();
    let connection_closed = match timeout(budget.close_timeout, connection.close()).await {
        Ok(Ok(())) => {
            info!(backend, "shared connection closed");
            true
        }
        Ok(Err(e)) => {
            error!(backend, error = %e, "failed to close shared connection");
            false
        }
        Err(_) => {
            error!(
                backend,
                timeout_ms = budget.close_timeout.as_millis() as u64,
                "closing shared connection timed out"
            );
            false
        }
    };

    Completion {
        drained,
        connection_closed,
    }
}
