//! Termination signal handling.
//!
//! Interrupt, terminate and hangup all end a run the same way: temporary
//! resources are released and the process exits with `128 + signal number`.
//! The handlers are registered before the pipeline starts, so a signal can
//! never fall back to its default action while a temporary path exists.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::errors::{EXIT_INTERRUPTED, InstallerError};
use crate::installer::TempResources;

/// How long a failed run waits for a concurrent signal to be handled.
///
/// A child tool in the same process group receives the terminal's signal as
/// well and can fail the pipeline before the signal task has run.
pub const SIGNAL_GRACE: Duration = Duration::from_millis(250);

/// Listeners for every signal that ends a run.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Registers the listeners. Must be called inside the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be installed.
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Registers the listeners. Must be called inside the runtime.
    ///
    /// # Errors
    ///
    /// Never fails on this platform.
    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps)]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next signal and returns the exit status it maps to.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Option<i32> {
        use crate::errors::{EXIT_HANGUP, EXIT_TERMINATED};

        tokio::select! {
            received = self.interrupt.recv() => received.map(|()| EXIT_INTERRUPTED),
            received = self.terminate.recv() => received.map(|()| EXIT_TERMINATED),
            received = self.hangup.recv() => received.map(|()| EXIT_HANGUP),
        }
    }

    /// Waits for Ctrl-C and returns the interrupt exit status.
    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Option<i32> {
        tokio::signal::ctrl_c().await.ok().map(|()| EXIT_INTERRUPTED)
    }
}

/// Background task that cleans up and exits on the first signal.
pub struct SignalWatcher {
    handle: JoinHandle<()>,
    received: Arc<AtomicI32>,
}

impl SignalWatcher {
    /// Spawns the watcher. `resources` is released before the process exits.
    #[must_use]
    pub fn spawn(mut signals: ShutdownSignals, resources: TempResources) -> Self {
        let received = Arc::new(AtomicI32::new(0));
        let recorded = Arc::clone(&received);

        let handle = tokio::spawn(async move {
            if let Some(status) = signals.recv().await {
                recorded.store(status, Ordering::SeqCst);
                eprintln!("\nInterrupted, cleaning up...");
                let removed = resources.release();
                tracing::debug!(removed, status, "released temporary resources after signal");
                std::process::exit(status);
            }
        });

        Self { handle, received }
    }

    /// Exit status of the signal seen so far, if any.
    #[must_use]
    pub fn received(&self) -> Option<i32> {
        match self.received.load(Ordering::SeqCst) {
            0 => None,
            status => Some(status),
        }
    }

    /// Stops watching and returns the run's final result.
    ///
    /// A failed run first gives a concurrent signal [`SIGNAL_GRACE`] to be
    /// handled, so a tool killed by the same signal is reported as an
    /// interrupt rather than a stage failure.
    ///
    /// # Errors
    ///
    /// Returns `outcome`'s error, or [`InstallerError::Interrupted`] when a
    /// signal was seen.
    pub async fn settle(mut self, outcome: Result<()>) -> Result<()> {
        if outcome.is_err() {
            let _ = tokio::time::timeout(SIGNAL_GRACE, &mut self.handle).await;
        }
        self.handle.abort();
        prefer_signal(outcome, self.received())
    }
}

/// Replaces a failure with the interrupt that caused it.
fn prefer_signal(outcome: Result<()>, received: Option<i32>) -> Result<()> {
    match (outcome, received) {
        (Err(_), Some(status)) => Err(InstallerError::interrupted(status).into()),
        (outcome, _) => outcome,
    }
}
