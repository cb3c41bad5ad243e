//! Process lifecycle: startup sequencing, signal-driven graceful shutdown,
//! and teardown of the shared connection.
//!
//! State only moves forward, one step at a time:
//! `Init -> Starting -> Serving -> ShuttingDown -> Stopped`.

pub mod coordinator;
pub mod signals;
pub mod startup;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::ConfigError;
use crate::database::StoreError;

pub use coordinator::{Completion, Coordinator, ShutdownBudget};
pub use signals::{os_notifications, ShutdownNotice};
pub use startup::{start, Started};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Init,
    Starting,
    Serving,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    fn successor(self) -> Option<Self> {
        match self {
            LifecycleState::Init => Some(LifecycleState::Starting),
            LifecycleState::Starting => Some(LifecycleState::Serving),
            LifecycleState::Serving => Some(LifecycleState::ShuttingDown),
            LifecycleState::ShuttingDown => Some(LifecycleState::Stopped),
            LifecycleState::Stopped => None,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Init => "init",
            LifecycleState::Starting => "starting",
            LifecycleState::Serving => "serving",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database connection failed: {0}")]
    Connect(#[source] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("invalid lifecycle transition {from} -> {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },
}

/// Shared handle on the process lifecycle state
#[derive(Clone)]
pub struct Lifecycle {
    tx: Arc<watch::Sender<LifecycleState>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LifecycleState::Init);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> LifecycleState {
        *self.tx.borrow()
    }

    #[cfg(test)]
    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Move to `to` if it is the direct successor of the current state.
    /// Check and set happen under the channel's lock.
    pub fn advance(&self, to: LifecycleState) -> Result<(), LifecycleError> {
        let mut from = to;
        let moved = self.tx.send_if_modified(|state| {
            from = *state;
            if state.successor() == Some(to) {
                *state = to;
                true
            } else {
                false
            }
        });

        if moved {
            tracing::info!(from = %from, to = %to, "lifecycle transition");
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { from, to })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_in_order() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.current(), LifecycleState::Init);
        for next in [
            LifecycleState::Starting,
            LifecycleState::Serving,
            LifecycleState::ShuttingDown,
            LifecycleState::Stopped,
        ] {
            lifecycle.advance(next).unwrap();
            assert_eq!(lifecycle.current(), next);
        }
    }

    #[test]
    fn refuses_skips_and_repeats() {
        let lifecycle = Lifecycle::new();
        assert!(matches!(
            lifecycle.advance(LifecycleState::Serving),
            Err(LifecycleError::InvalidTransition {
                from: LifecycleState::Init,
                to: LifecycleState::Serving
            })
        ));

        lifecycle.advance(LifecycleState::Starting).unwrap();
        assert!(lifecycle.advance(LifecycleState::Starting).is_err());
        assert_eq!(lifecycle.current(), LifecycleState::Starting);
    }

    #[tokio::test]
    async fn subscribers_observe_transitions() {
        let lifecycle = Lifecycle::new();
        let mut rx = lifecycle.subscribe();
        lifecycle.advance(LifecycleState::Starting).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), LifecycleState::Starting);
    }
}
