// # Port Source Trait
//
// Defines the interface for reading the forwarded port from the VPN sidecar.
//
// ## Implementations
//
// - Gluetun control server: `portpusher-source-gluetun` crate
//
// ## Usage
//
// ```rust,ignore
// use portpusher_core::PortSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* PortSource implementation */;
//
//     let port = source.pull().await?;
//     println!("forwarded port is {}", port);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for port source implementations
///
/// A port source is polled once per engine iteration. It never caches a
/// previous answer: every call asks the sidecar again.
///
/// # Rules
///
/// - No retry logic. A failed pull is reported and the engine decides when
///   to try again.
/// - A port of `0` is never returned. Sidecars use `0` to mean "nothing
///   forwarded right now", which must surface as [`crate::Error::Unavailable`].
#[async_trait]
pub trait PortSource: Send + Sync {
    /// Fetch the currently forwarded port
    ///
    /// # Returns
    ///
    /// - `Ok(u16)`: A usable port in `1..=65535`
    /// - `Err(Error::Unavailable)`: The sidecar is not running or has no port
    /// - `Err(Error)`: Transport or decode failure
    async fn pull(&self) -> Result<u16, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing port sources from configuration
pub trait PortSourceFactory: Send + Sync {
    /// Create a PortSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Sidecar location
    /// - `client`: HTTP transport shared with the rest of the process
    fn create(
        &self,
        config: &crate::config::SourceConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortSource>, crate::Error>;
}
