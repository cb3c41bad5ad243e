use std::fmt;

use tokio::sync::mpsc;
use tracing::{error, warn};

/// A request from the operating system to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownNotice {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownNotice::Interrupt => f.write_str("SIGINT"),
            ShutdownNotice::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Forward SIGINT and SIGTERM into a channel.
///
/// Handlers are registered before this returns, so a signal arriving right
/// after startup is queued rather than lost. The forwarder never blocks on a
/// full channel; extra notices beyond the buffer are dropped.
pub fn os_notifications() -> std::io::Result<mpsc::Receiver<ShutdownNotice>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            loop {
                let notice = tokio::select! {
                    Some(()) = interrupt.recv() => ShutdownNotice::Interrupt,
                    Some(()) = terminate.recv() => ShutdownNotice::Terminate,
                    else => break,
                };
                forward(&tx, notice);
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                forward(&tx, ShutdownNotice::Interrupt);
            }
            error!("ctrl-c listener failed; shutdown notices disabled");
        });
    }

    Ok(rx)
}

fn forward(tx: &mpsc::Sender<ShutdownNotice>, notice: ShutdownNotice) {
    match tx.try_send(notice) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(signal = %notice, "shutdown notice dropped; already pending")
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            error!(signal = %notice, "shutdown watcher is gone")
        }
    }
}
