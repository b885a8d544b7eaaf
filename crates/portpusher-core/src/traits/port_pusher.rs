// # Port Pusher Trait
//
// Defines the interface for writing a listen port into a torrent client.
//
// ## Implementations
//
// - Transmission RPC: `portpusher-backend-transmission` crate
// - qBittorrent WebUI: `portpusher-backend-qbittorrent` crate
// - Deluge Web JSON-RPC: `portpusher-backend-deluge` crate
//
// ## Usage
//
// ```rust,ignore
// use portpusher_core::{PortPusher, PushOutcome};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let pusher = /* PortPusher implementation */;
//
//     match pusher.push(51413).await? {
//         PushOutcome::Unchanged { .. } => println!("already correct"),
//         PushOutcome::Pushed { previous_port, .. } => println!("was {:?}", previous_port),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// Result of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Backend already listened on the desired port with random assignment off
    Unchanged {
        /// The current (and desired) port
        port: u16,
    },
    /// Backend settings were changed
    Pushed {
        /// The port the backend reported before the write, if it reported one
        previous_port: Option<u16>,
        /// The port that was written
        port: u16,
    },
}

impl PushOutcome {
    /// The port the backend is now configured with
    pub fn port(&self) -> u16 {
        match self {
            PushOutcome::Unchanged { port } | PushOutcome::Pushed { port, .. } => *port,
        }
    }

    /// Whether a mutating call was issued
    pub fn changed(&self) -> bool {
        matches!(self, PushOutcome::Pushed { .. })
    }
}

impl fmt::Display for PushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushOutcome::Unchanged { port } => write!(f, "port {} already set", port),
            PushOutcome::Pushed {
                previous_port: Some(previous),
                port,
            } => write!(f, "port changed {} -> {}", previous, port),
            PushOutcome::Pushed {
                previous_port: None,
                port,
            } => write!(f, "port set to {}", port),
        }
    }
}

/// Trait for torrent client backends
///
/// Each implementation wraps one client protocol: its login or session
/// handshake, how it reads the current port, and how it writes a new one.
///
/// # Session State
///
/// Implementations own whatever session state their protocol needs (session
/// tokens, request id counters, cookies held by their HTTP client). That
/// state is private to the instance and lives as long as it does. The engine
/// calls `push` sequentially, never concurrently on the same instance.
///
/// # Rules
///
/// - Read before write. A mutating call is only issued when the observed
///   port differs from `desired` or the backend's random-port flag is on.
/// - No retry logic and no sleeping. Return an error; the engine owns the
///   next attempt.
/// - No knowledge of other backends.
///
/// # Idempotency
///
/// Calling `push` twice with the same port must issue the mutating call at
/// most once: the second call observes the converged state and returns
/// [`PushOutcome::Unchanged`].
#[async_trait]
pub trait PortPusher: Send + Sync {
    /// Make the backend listen on `desired`
    ///
    /// # Returns
    ///
    /// - `Ok(PushOutcome::Unchanged)`: Nothing to do
    /// - `Ok(PushOutcome::Pushed)`: Settings were written
    /// - `Err(Error)`: Any step of the exchange failed
    async fn push(&self, desired: u16) -> Result<PushOutcome, crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing backends from configuration
pub trait PortPusherFactory: Send + Sync {
    /// Create a PortPusher instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Backend location and credentials
    /// - `client`: HTTP transport. Cookie-session backends require a client
    ///   built with a cookie store, see [`crate::transport::client`].
    fn create(
        &self,
        config: &crate::config::BackendConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortPusher>, crate::Error>;
}
