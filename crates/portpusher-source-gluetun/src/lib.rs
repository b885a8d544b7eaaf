// # Gluetun Port Source
//
// This crate reads the VPN forwarded port from the Gluetun control server.
//
// ## Protocol
//
// Two unauthenticated GETs per pull:
// 1. `/v1/openvpn/status` must report `"running"`
// 2. `/v1/openvpn/portforwarded` returns the port, where `0` means none
//
// Nothing is cached between pulls. Gluetun drops and re-acquires the
// forwarded port whenever the tunnel reconnects, so every iteration asks again.

use portpusher_core::BackendRegistry;
use portpusher_core::config::SourceConfig;
use portpusher_core::traits::{PortSource, PortSourceFactory};
use portpusher_core::{Error, Result};

use serde::Deserialize;
use tracing::debug;

/// Registry name of this source
pub const SOURCE_NAME: &str = "gluetun";

/// Status value reported while the tunnel is up
const STATUS_RUNNING: &str = "running";

/// `GET /v1/openvpn/status` response
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

/// `GET /v1/openvpn/portforwarded` response
///
/// Decoded wide so that out-of-range values are reported instead of truncated.
#[derive(Debug, Deserialize)]
struct PortResponse {
    port: i64,
}

/// Port source backed by the Gluetun control server
pub struct GluetunSource {
    /// Control server base URL
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl GluetunSource {
    /// Create a Gluetun source with its own HTTP client
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self::with_client(config, portpusher_core::transport::client()?))
    }

    /// Create a Gluetun source on a shared HTTP client
    pub fn with_client(config: &SourceConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url(),
            client,
        }
    }

    /// GET `path` and decode a JSON body, naming `step` in errors
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, step: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status(step, status.as_u16()));
        }

        let body = response.text().await?;
        debug!("{} response: {}", step, body);

        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("{}: malformed response: {}", step, e)))
    }
}

/// Convert the reported port into a usable one
fn usable_port(reported: i64) -> Result<u16> {
    if reported == 0 {
        return Err(Error::unavailable("gluetun responded with port 0"));
    }

    u16::try_from(reported)
        .map_err(|_| Error::decode(format!("gluetun reported out-of-range port {}", reported)))
}

#[async_trait::async_trait]
impl PortSource for GluetunSource {
    async fn pull(&self) -> Result<u16> {
        let status: StatusResponse = self.get_json("/v1/openvpn/status", "status").await?;
        if status.status != STATUS_RUNNING {
            return Err(Error::unavailable(format!(
                "status is {}, cannot fetch forwarded port",
                status.status
            )));
        }

        let forwarded: PortResponse = self
            .get_json("/v1/openvpn/portforwarded", "portforwarded")
            .await?;

        usable_port(forwarded.port)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Factory for creating Gluetun sources
pub struct GluetunFactory;

impl PortSourceFactory for GluetunFactory {
    fn create(
        &self,
        config: &SourceConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortSource>> {
        config.validate()?;
        Ok(Box::new(GluetunSource::with_client(config, client)))
    }
}

/// Register the Gluetun source with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_source(SOURCE_NAME, Box::new(GluetunFactory));
}
