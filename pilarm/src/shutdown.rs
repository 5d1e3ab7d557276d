//! Coordinated shutdown.
//!
//! A single [`Shutdown`] is cloned into every worker. It carries the stop
//! flag (a [`CancellationToken`], flipped once and never reset), tracks the
//! worker tasks, and tracks in-flight notification dispatches separately so
//! shutdown can give them a short grace period and then abandon them.
//!
//! ```text
//!  signal / "exit" ──► trigger() ──► token cancelled ──► workers exit their loops
//!                                                            │
//!  await_all_stopped(): wait for workers (bounded) ◄─────────┘
//!                       then wait for dispatches (bounded), then return
//! ```

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::signal::unix::{SignalKind, signal};
use tokio::time;
use tokio_stream::StreamExt;
use tokio_stream::StreamMap;
use tokio_stream::wrappers::SignalStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::tracing::prelude::*;

/// What asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(&'static str),
    ExitCommand,
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "signal {name}"),
            ShutdownReason::ExitCommand => write!(f, "exit command"),
            ShutdownReason::Requested => write!(f, "requested"),
        }
    }
}

/// How the wait for workers ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every worker observed the stop flag and returned.
    Clean,

    /// The timeout expired with workers still running.
    Forced { stuck_workers: usize },
}

/// Process-wide stop flag plus the tasks that must observe it.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<ShutdownReason>>,
    workers: TaskTracker,
    dispatches: TaskTracker,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for worker loops to poll or select on.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_triggered(&self) -> bool {
        self.reason.get().is_some()
    }

    /// Set the stop flag.
    ///
    /// Safe to call from any task and any number of times; only the first
    /// call has an effect. Returns whether this call was the one that
    /// triggered shutdown.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        if self.reason.set(reason).is_err() {
            debug!(%reason, "Shutdown already in progress");
            return false;
        }

        warn!(%reason, "Shutting down");
        self.token.cancel();
        true
    }

    /// What triggered shutdown, if it has started.
    pub fn reason(&self) -> Option<ShutdownReason> {
        self.reason.get().copied()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }

    /// Spawn a worker loop that shutdown will wait for.
    pub fn spawn_worker<F>(&self, name: &'static str, worker: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(worker = name, "Starting worker");
        self.workers.spawn(async move {
            worker.await;
            debug!(worker = name, "Worker stopped");
        });
    }

    /// Tracker for fire-and-forget notification tasks.
    pub fn dispatches(&self) -> TaskTracker {
        self.dispatches.clone()
    }

    /// Wait for every worker to stop, then give in-flight notifications a
    /// grace period.
    ///
    /// Call after [`trigger`](Self::trigger). Workers get `timeout` to exit;
    /// after that the outcome is [`ShutdownOutcome::Forced`]. Notifications
    /// still running after `notification_grace` are abandoned.
    pub async fn await_all_stopped(
        &self,
        timeout: Duration,
        notification_grace: Duration,
    ) -> ShutdownOutcome {
        self.workers.close();
        info!(workers = self.workers.len(), "Waiting for workers");

        let outcome = match time::timeout(timeout, self.workers.wait()).await {
            Ok(()) => {
                info!("All workers stopped");
                ShutdownOutcome::Clean
            }
            Err(_) => {
                let stuck_workers = self.workers.len();
                error!(
                    stuck_workers,
                    timeout_s = timeout.as_secs_f64(),
                    "Workers did not stop in time; forcing termination"
                );
                ShutdownOutcome::Forced { stuck_workers }
            }
        };

        self.dispatches.close();
        if !self.dispatches.is_empty() {
            info!(
                pending = self.dispatches.len(),
                "Waiting for in-flight notifications"
            );
            if time::timeout(notification_grace, self.dispatches.wait())
                .await
                .is_err()
            {
                warn!(
                    abandoned = self.dispatches.len(),
                    "Abandoning in-flight notifications"
                );
            }
        }

        outcome
    }
}

fn handled_signals() -> [(&'static str, SignalKind); 7] {
    [
        ("SIGHUP", SignalKind::hangup()),
        ("SIGINT", SignalKind::interrupt()),
        ("SIGQUIT", SignalKind::quit()),
        ("SIGTERM", SignalKind::terminate()),
        ("SIGUSR1", SignalKind::user_defined1()),
        ("SIGUSR2", SignalKind::user_defined2()),
        ("SIGALRM", SignalKind::alarm()),
    ]
}

/// Turns termination signals into a shutdown request.
pub struct SignalListener {
    signals: StreamMap<&'static str, SignalStream>,
}

impl SignalListener {
    /// Install handlers for every signal that should stop the monitor.
    pub fn install() -> io::Result<Self> {
        let mut signals = StreamMap::new();
        for (name, kind) in handled_signals() {
            signals.insert(name, SignalStream::new(signal(kind)?));
        }

        Ok(Self { signals })
    }

    /// Wait for a signal (or for shutdown to start some other way).
    pub async fn run(mut self, shutdown: Shutdown) {
        let token = shutdown.token();

        tokio::select! {
            Some((name, ())) = self.signals.next() => {
                warn!(signal = name, "Got shutdown signal");
                shutdown.trigger(ShutdownReason::Signal(name));
            }
            _ = token.cancelled() => {}
        }
    }
}
