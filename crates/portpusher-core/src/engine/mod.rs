//! Core push engine
//!
//! The PushEngine is responsible for:
//! - Pulling the forwarded port from the PortSource
//! - Pushing it to every configured PortPusher, in order
//! - Choosing the next delay from the iteration's outcome
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ PortSource  │─── u16 ───┐
//! └─────────────┘           │
//!                           ▼
//!                  ┌──────────────┐
//!                  │  PushEngine  │──────────────┐
//!                  └──────────────┘              │
//!                           │                    ▼
//!        ┌──────────────────┼──────────────┐  ┌─────────┐
//!        ▼                  ▼              ▼  │ Events  │
//! ┌──────────────┐ ┌──────────────┐ ┌────────┐└─────────┘
//! │ Transmission │ │ qBittorrent  │ │ Deluge │
//! └──────────────┘ └──────────────┘ └────────┘
//! ```
//!
//! ## Iteration Flow
//!
//! 1. Pull the forwarded port
//! 2. On failure, skip every backend
//! 3. Otherwise push to each backend, continuing past failures
//! 4. Sleep the error delay if anything failed, the success delay if not

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::traits::{PortPusher, PortSource, PushOutcome};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Events emitted by the PushEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { backends_count: usize },

    /// Forwarded port obtained from the sidecar
    PortPulled { port: u16 },

    /// Sidecar could not provide a port; backends skipped this iteration
    PullFailed { error: String },

    /// Backend push succeeded (changed or not)
    PushSucceeded {
        backend: &'static str,
        outcome: PushOutcome,
    },

    /// Backend push failed
    PushFailed {
        backend: &'static str,
        error: String,
    },

    /// Iteration finished and the engine is about to sleep
    IterationFinished { failed: bool, next_delay: Duration },

    /// Engine stopped
    Stopped { reason: String },
}

/// Result of pushing to one backend
#[derive(Debug)]
pub struct BackendReport {
    /// Backend name
    pub backend: &'static str,
    /// Push result
    pub result: Result<PushOutcome>,
}

/// Result of one engine iteration
#[derive(Debug)]
pub struct IterationReport {
    /// Pull result
    pub pulled: Result<u16>,
    /// One entry per backend, in push order; empty when the pull failed
    pub backends: Vec<BackendReport>,
    /// Delay the engine chose for the next iteration
    pub next_delay: Duration,
}

impl IterationReport {
    /// Whether the pull or any push failed
    pub fn failed(&self) -> bool {
        self.pulled.is_err() || self.backends.iter().any(|b| b.result.is_err())
    }

    /// Number of backends whose push failed
    pub fn failure_count(&self) -> usize {
        self.backends.iter().filter(|b| b.result.is_err()).count()
    }
}

type ShutdownSignal = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Core push engine
///
/// The engine drives the pull → push cycle forever. It owns the port source
/// and every backend; backends are pushed strictly one after another in the
/// order they were given.
///
/// ## Lifecycle
///
/// 1. Create with [`PushEngine::new()`]
/// 2. Start with [`PushEngine::run()`]
/// 3. Engine runs until SIGINT/SIGTERM arrives during a sleep
pub struct PushEngine {
    /// Sidecar the port is pulled from
    source: Box<dyn PortSource>,

    /// Backends, in push order
    pushers: Vec<Box<dyn PortPusher>>,

    /// Delay after a clean iteration
    delay_success: Duration,

    /// Delay after an iteration with any failure
    delay_error: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl PushEngine {
    /// Create a new push engine
    ///
    /// # Parameters
    ///
    /// - `source`: Port source implementation
    /// - `pushers`: Backends, in the order they will be pushed
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn PortSource>,
        pushers: Vec<Box<dyn PortPusher>>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        if pushers.is_empty() {
            return Err(Error::config(
                "No bittorrent clients are configured, nothing to do",
            ));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            source,
            pushers,
            delay_success: config.delay_success(),
            delay_error: config.delay_error(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Override both delays
    ///
    /// Sub-second delays are only useful in tests; configuration works in
    /// whole seconds.
    pub fn with_delays(mut self, delay_success: Duration, delay_error: Duration) -> Self {
        self.delay_success = delay_success;
        self.delay_error = delay_error;
        self
    }

    /// Names of the configured backends, in push order
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.pushers.iter().map(|p| p.backend_name()).collect()
    }

    /// Run the engine
    ///
    /// Loops until the process receives SIGINT or SIGTERM. Runtime errors
    /// never end the loop; they only select the error delay.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(Box::pin(shutdown_signal())).await
    }

    /// Run a single iteration and return what happened
    ///
    /// Does not sleep; the returned report carries the delay the loop would use.
    pub async fn run_once(&self) -> IterationReport {
        info!("Running...");

        let pulled = self.source.pull().await;

        let backends = match &pulled {
            Ok(port) => {
                info!("Forwarded port is {}", port);
                self.emit_event(EngineEvent::PortPulled { port: *port });
                self.push_all(*port).await
            }
            Err(e) => {
                error!("{}: pull port error: {}", self.source.source_name(), e);
                self.emit_event(EngineEvent::PullFailed {
                    error: e.to_string(),
                });
                Vec::new()
            }
        };

        let mut report = IterationReport {
            pulled,
            backends,
            next_delay: self.delay_success,
        };

        let failed = report.failed();
        if failed {
            report.next_delay = self.delay_error;
            info!("Done. Next push attempt in {:?}.", report.next_delay);
        } else {
            info!("Done. Next push in {:?}.", report.next_delay);
        }

        self.emit_event(EngineEvent::IterationFinished {
            failed,
            next_delay: report.next_delay,
        });

        report
    }

    /// Push `port` to every backend in order
    ///
    /// A failing backend is logged and recorded; the remaining backends are
    /// still pushed.
    async fn push_all(&self, port: u16) -> Vec<BackendReport> {
        let mut reports = Vec::with_capacity(self.pushers.len());

        for pusher in &self.pushers {
            let backend = pusher.backend_name();
            debug!("Pushing port {} to {}", port, backend);

            let result = pusher.push(port).await;
            match &result {
                Ok(outcome) => {
                    debug!("{}: {}", backend, outcome);
                    self.emit_event(EngineEvent::PushSucceeded {
                        backend,
                        outcome: *outcome,
                    });
                }
                Err(e) => {
                    error!("{}: push error: {}", backend, e);
                    self.emit_event(EngineEvent::PushFailed {
                        backend,
                        error: e.to_string(),
                    });
                }
            }

            reports.push(BackendReport { backend, result });
        }

        reports
    }

    /// Internal run implementation that stops when `shutdown` resolves
    ///
    /// The shutdown signal is only observed between iterations, while the
    /// engine sleeps. An iteration in progress always runs to completion.
    async fn run_internal(&self, mut shutdown: ShutdownSignal) -> Result<()> {
        info!(
            "Push engine started with {} backend(s): {}",
            self.pushers.len(),
            self.backend_names().join(", ")
        );
        self.emit_event(EngineEvent::Started {
            backends_count: self.pushers.len(),
        });

        loop {
            let report = self.run_once().await;

            tokio::select! {
                _ = tokio::time::sleep(report.next_delay) => {}

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // The engine never waits on observers; a closed channel means nobody listens.
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }

    /// Test-only helper to run the engine with a controlled shutdown signal
    ///
    /// **TESTING ONLY**: Production code should use `run()` instead, which
    /// manages shutdown via OS signals rather than programmatic channels.
    /// Passing `None` falls back to OS signals.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        match shutdown_rx {
            Some(rx) => {
                self.run_internal(Box::pin(async move {
                    let _ = rx.await;
                }))
                .await
            }
            None => self.run().await,
        }
    }
}

/// Resolve on SIGINT or SIGTERM
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            warn!("Failed to setup SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

/// Resolve on Ctrl-C
#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_event_clone_eq() {
        let event = EngineEvent::PushSucceeded {
            backend: "deluge",
            outcome: PushOutcome::Unchanged { port: 6881 },
        };

        assert_eq!(event.clone(), event);
    }

    #[test]
    fn test_report_failed_when_pull_failed() {
        let report = IterationReport {
            pulled: Err(Error::unavailable("status is stopped")),
            backends: Vec::new(),
            next_delay: Duration::from_secs(1),
        };

        assert!(report.failed());
        assert_eq!(report.failure_count(), 0);
    }

    #[test]
    fn test_report_counts_backend_failures() {
        let report = IterationReport {
            pulled: Ok(12345),
            backends: vec![
                BackendReport {
                    backend: "transmission",
                    result: Ok(PushOutcome::Unchanged { port: 12345 }),
                },
                BackendReport {
                    backend: "deluge",
                    result: Err(Error::NoOnlineHosts),
                },
            ],
            next_delay: Duration::from_secs(1),
        };

        assert!(report.failed());
        assert_eq!(report.failure_count(), 1);
    }
}
