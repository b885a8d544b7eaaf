// # Deluge Backend
//
// This crate pushes the forwarded port into Deluge through the Deluge Web
// JSON-RPC endpoint (`POST /json`).
//
// ## Session
//
// Deluge Web authenticates with a session cookie set by `auth.login`; the
// HTTP client must have a cookie store. The web UI is a separate process
// from the Deluge daemon and may not be attached to any daemon, in which
// case the pusher attaches it to the first online host before touching the
// configuration.
//
// ## Flow
//
// ```text
// auth.login ──► web.connected ──true──────────────────────────► core.get_config
//                     │                                                │
//                   false                                     differs? │
//                     ▼                                                ▼
//               web.get_hosts ──► web.get_host_status ──Online──► web.connect
//                                  (per host, in order)                │
//                                                                      ▼
//                                                        core.get_config ──► core.set_config
// ```
//
// Every request carries a message id that the response must echo.

mod wire;

pub use wire::{CoreConfig, HostEntry, HostStatus};

use async_trait::async_trait;
use portpusher_core::config::{BackendConfig, BackendKind};
use portpusher_core::traits::{PortPusher, PortPusherFactory, PushOutcome};
use portpusher_core::{BackendRegistry, Error, Result};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use wire::{RpcRequest, RpcResponse};

/// Name used in logs and reports
const BACKEND_NAME: &str = "deluge";

/// JSON-RPC endpoint path
const RPC_PATH: &str = "/json";

/// Deluge Web JSON-RPC backend
pub struct DelugePusher {
    /// Web UI base URL, also sent as `Origin` and `Referer`
    base_url: String,

    /// Web UI password
    /// ⚠️ NEVER log this value
    password: String,

    /// Id of the last request
    last_id: AtomicU64,

    /// HTTP client, must carry a cookie store
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for DelugePusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelugePusher")
            .field("base_url", &self.base_url)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl DelugePusher {
    /// Create a Deluge backend with its own cookie-enabled HTTP client
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self::with_client(
            config,
            portpusher_core::transport::client()?,
        ))
    }

    /// Create a Deluge backend on a shared HTTP client
    ///
    /// The client must have been built with a cookie store, otherwise every
    /// call after `auth.login` fails as unauthenticated.
    pub fn with_client(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url(),
            password: config.password().to_string(),
            last_id: AtomicU64::new(0),
            client,
        }
    }

    /// Call a JSON-RPC method and return its `result`
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let request = RpcRequest { method, params, id };

        let response = self
            .client
            .post(format!("{}{}", self.base_url, RPC_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::ORIGIN, &self.base_url)
            .header(reqwest::header::REFERER, &self.base_url)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status(method, status.as_u16()));
        }

        let body = response.text().await?;
        tracing::debug!("{}: {} response={}", BACKEND_NAME, method, body);

        let decoded: RpcResponse = serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("{}: malformed response: {}", method, e)))?;

        if decoded.id != id {
            return Err(Error::protocol(format!(
                "{}: response id {} does not match request id {}",
                method, decoded.id, id
            )));
        }

        if let Some(error) = decoded.error {
            return Err(Error::rpc(error.code, format!("{}: {}", method, error.message)));
        }

        Ok(decoded.result)
    }

    /// Call a method whose result is a boolean
    async fn call_bool(&self, method: &str, params: Vec<Value>) -> Result<bool> {
        let result = self.call(method, params).await?;
        result
            .as_bool()
            .ok_or_else(|| Error::decode(format!("{}: expected boolean, got {}", method, result)))
    }

    async fn login(&self) -> Result<()> {
        if !self
            .call_bool("auth.login", vec![json!(self.password)])
            .await?
        {
            return Err(Error::auth("auth.login rejected the password"));
        }

        tracing::debug!("{}: login OK", BACKEND_NAME);
        Ok(())
    }

    /// Attach the web UI to a daemon unless it already is
    async fn ensure_connected(&self) -> Result<()> {
        if self.call_bool("web.connected", Vec::new()).await? {
            tracing::debug!("{}: web UI is connected", BACKEND_NAME);
            return Ok(());
        }

        tracing::debug!("{}: web UI is disconnected", BACKEND_NAME);

        let hosts = HostEntry::list_from_value(&self.call("web.get_hosts", Vec::new()).await?)?;
        if hosts.is_empty() {
            return Err(Error::NoHosts);
        }

        for host in &hosts {
            let status = HostStatus::from_value(
                &self
                    .call("web.get_host_status", vec![json!(host.id)])
                    .await?,
            )?;
            tracing::debug!(
                "{}: host {} ({}:{}) is {}",
                BACKEND_NAME,
                host.id,
                host.address,
                host.port,
                status.status
            );

            if status.is_online() {
                self.call("web.connect", vec![json!(host.id)]).await?;
                tracing::info!("{}: connected to host {}", BACKEND_NAME, host.id);
                return Ok(());
            }
        }

        Err(Error::NoOnlineHosts)
    }

    async fn core_config(&self) -> Result<CoreConfig> {
        let result = self.call("core.get_config", Vec::new()).await?;
        serde_json::from_value(result)
            .map_err(|e| Error::decode(format!("core.get_config: unexpected result: {}", e)))
    }

    async fn set_listen_port(&self, port: u16) -> Result<()> {
        self.call(
            "core.set_config",
            vec![json!({
                "listen_ports": [port, port],
                "random_port": false,
            })],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PortPusher for DelugePusher {
    async fn push(&self, desired: u16) -> Result<PushOutcome> {
        self.login().await?;
        self.ensure_connected().await?;

        let config = self.core_config().await?;
        let current = config.listen_port()?;

        if current == desired && !config.random_port {
            tracing::info!("{}: port is correct", BACKEND_NAME);
            return Ok(PushOutcome::Unchanged { port: desired });
        }

        tracing::info!(
            "{}: pushing port {}, current port is {}",
            BACKEND_NAME,
            desired,
            current
        );
        self.set_listen_port(desired).await?;

        tracing::info!("{}: port pushed", BACKEND_NAME);
        Ok(PushOutcome::Pushed {
            previous_port: Some(current),
            port: desired,
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

/// Factory for creating Deluge backends
pub struct DelugeFactory;

impl PortPusherFactory for DelugeFactory {
    fn create(
        &self,
        config: &BackendConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortPusher>> {
        if config.kind != BackendKind::Deluge {
            return Err(Error::config("Invalid config for Deluge backend"));
        }
        config.validate()?;

        Ok(Box::new(DelugePusher::with_client(config, client)))
    }
}

/// Register the Deluge backend with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_pusher(BackendKind::Deluge, Box::new(DelugeFactory));
}
