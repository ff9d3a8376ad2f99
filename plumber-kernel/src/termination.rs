//! Host termination hooks.
//!
//! [`EnvironmentRuntime::start`](crate::EnvironmentRuntime::start) arms a
//! [`TerminationLatch`] over the host's hook before prompting begins, and the
//! session keeps it until exit scripts have run. Prompting, on-load and
//! interaction all race against the latch, so a request made between two
//! stages is held until the next one checks it.

use std::future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Resolves when the host asks the environment to stop.
#[async_trait]
pub trait TerminationHook: Send + Sync {
    /// Waits for a termination request. Never returning is valid.
    async fn terminated(&self);
}

/// Fires on Ctrl-C, and on SIGTERM on unix platforms.
///
/// A signal listener that cannot be installed logs a warning and never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShutdownSignal;

#[async_trait]
impl TerminationHook for ShutdownSignal {
    async fn terminated(&self) {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "failed to listen for ctrl-c");
                future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let sigterm = async {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    if stream.recv().await.is_none() {
                        future::pending::<()>().await;
                    }
                }
                Err(err) => {
                    warn!(%err, "failed to listen for SIGTERM");
                    future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let sigterm = future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received ctrl-c"),
            () = sigterm => info!("received SIGTERM"),
        }
    }
}

/// Programmatic termination, triggered from any clone.
#[derive(Debug, Clone)]
pub struct TerminationTrigger {
    sender: Arc<watch::Sender<bool>>,
}

impl TerminationTrigger {
    /// Creates an untriggered hook.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests termination. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.sender.send_replace(true) {
            info!("termination requested");
        }
    }

    /// Returns `true` once [`TerminationTrigger::trigger`] was called.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for TerminationTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminationHook for TerminationTrigger {
    async fn terminated(&self) {
        let mut receiver = self.sender.subscribe();
        let fired = receiver.wait_for(|triggered| *triggered).await.is_ok();
        if !fired {
            future::pending::<()>().await;
        }
    }
}

/// Records the first termination request of a [`TerminationHook`].
///
/// Arming spawns a listener that awaits the hook for as long as the latch is
/// alive. Edge-triggered hooks such as [`ShutdownSignal`] are therefore never
/// missed while nothing else is awaiting them. Dropping the latch stops the
/// listener.
#[derive(Debug)]
pub struct TerminationLatch {
    tripped: watch::Receiver<bool>,
    listener: JoinHandle<()>,
}

impl TerminationLatch {
    /// Starts listening on `hook`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn arm(hook: Arc<dyn TerminationHook>) -> Self {
        let (sender, tripped) = watch::channel(false);
        let listener = tokio::spawn(async move {
            hook.terminated().await;
            debug!("termination latched");
            sender.send_replace(true);
            // Keep the sender so late waiters still observe the request.
            future::pending::<()>().await;
        });
        Self { tripped, listener }
    }

    /// Returns `true` once the hook has fired.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        *self.tripped.borrow()
    }

    /// Resolves once the hook has fired, immediately if it already has.
    pub async fn tripped(&self) {
        let mut receiver = self.tripped.clone();
        if receiver.wait_for(|tripped| *tripped).await.is_err() {
            future::pending::<()>().await;
        }
    }
}

impl Drop for TerminationLatch {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// A hook that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverTerminate;

#[async_trait]
impl TerminationHook for NeverTerminate {
    async fn terminated(&self) {
        future::pending::<()>().await;
    }
}
