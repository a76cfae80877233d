// Cancellation and deadline handling for external commands

use std::time::Duration;
use tokio::sync::watch;

/// Default upper bound for a single external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Caller-supplied context threaded through every external call.
///
/// Carries a cancellation signal and the per-command timeout. Cloning is cheap
/// and every clone observes the same signal.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: watch::Receiver<bool>,
    command_timeout: Duration,
}

/// Handle that cancels every [`Context`] created alongside it
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Context {
    /// Create a cancellable context and its handle
    pub fn new(command_timeout: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Context {
                cancelled: rx,
                command_timeout,
            },
            CancelHandle { tx },
        )
    }

    /// A context that is never cancelled, only bounded by the default timeout
    pub fn background() -> Self {
        let (ctx, _handle) = Context::new(DEFAULT_COMMAND_TIMEOUT);
        ctx
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the context is cancelled. Never resolves for a context
    /// whose handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
