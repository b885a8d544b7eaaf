// # Transmission Backend
//
// This crate pushes the forwarded port into Transmission over its RPC
// endpoint (`POST /transmission/rpc`).
//
// ## Session Handshake
//
// Transmission protects the RPC endpoint with a session id (CSRF token):
//
// 1. A request without a valid `X-Transmission-Session-Id` is answered with
//    HTTP 409 and a fresh id in the same header
// 2. The client caches the id and re-issues the request exactly once
// 3. HTTP 401 means the credentials were rejected; the cached id is dropped
//    so the next push starts over
//
// Every request also carries HTTP Basic credentials.
//
// ## Flow
//
// - `session-get` for `peer-port` and `peer-port-random-on-start`
// - `session-set` only when the port differs or random-on-start is enabled
//
// ## API Reference
//
// - RPC spec: https://github.com/transmission/transmission/blob/main/docs/rpc-spec.md

use async_trait::async_trait;
use portpusher_core::config::{BackendConfig, BackendKind};
use portpusher_core::traits::{PortPusher, PortPusherFactory, PushOutcome};
use portpusher_core::{BackendRegistry, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Name used in logs and reports
const BACKEND_NAME: &str = "transmission";

/// RPC endpoint path
const RPC_PATH: &str = "/transmission/rpc";

/// Session id header, sent on requests and issued on 409 responses
pub const SESSION_ID_HEADER: &str = "X-Transmission-Session-Id";

/// RPC result string on success
const RESULT_SUCCESS: &str = "success";

/// RPC request envelope
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    arguments: Value,
    method: &'a str,
    tag: u64,
}

/// RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    arguments: Value,
    result: String,
    #[serde(default)]
    tag: Option<u64>,
}

/// `session-get` arguments we ask for
#[derive(Debug, Clone, Copy, Deserialize)]
struct PortInfo {
    #[serde(rename = "peer-port")]
    peer_port: u16,
    #[serde(rename = "peer-port-random-on-start", default)]
    peer_port_random: bool,
}

/// Transmission RPC backend
///
/// # Session State
///
/// The session id is cached for the lifetime of the pusher and reused
/// across pushes until Transmission rotates it (409) or rejects the
/// credentials (401).
pub struct TransmissionPusher {
    /// Full RPC URL
    rpc_url: String,

    /// RPC user name
    username: String,

    /// RPC password
    /// ⚠️ NEVER log this value
    password: String,

    /// Cached session id, absent until the first 409
    session_id: RwLock<Option<String>>,

    /// Tag of the last request
    last_tag: AtomicU64,

    /// HTTP client
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for TransmissionPusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionPusher")
            .field("rpc_url", &self.rpc_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl TransmissionPusher {
    /// Create a Transmission backend with its own HTTP client
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self::with_client(
            config,
            portpusher_core::transport::client()?,
        ))
    }

    /// Create a Transmission backend on a shared HTTP client
    pub fn with_client(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            rpc_url: format!("{}{}", config.base_url(), RPC_PATH),
            username: config.username().to_string(),
            password: config.password().to_string(),
            session_id: RwLock::new(None),
            last_tag: AtomicU64::new(0),
            client,
        }
    }

    /// Currently cached session id
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Send one RPC request with credentials and the cached session id
    async fn send(&self, request: &RpcRequest<'_>) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .post(&self.rpc_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(request);

        if let Some(id) = self.session_id.read().await.as_deref() {
            builder = builder.header(SESSION_ID_HEADER, id);
        }

        Ok(builder.send().await?)
    }

    /// Cache the session id issued with a 409 response
    async fn capture_session_id(&self, response: &reqwest::Response) -> Result<()> {
        let id = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::handshake("expected session id not received"))?;

        tracing::debug!("{}: new session id received", BACKEND_NAME);
        *self.session_id.write().await = Some(id.to_string());
        Ok(())
    }

    /// Call an RPC method and return its `arguments`
    async fn rpc(&self, method: &str, arguments: Value) -> Result<Value> {
        let tag = self.last_tag.fetch_add(1, Ordering::SeqCst) + 1;
        let request = RpcRequest {
            arguments,
            method,
            tag,
        };

        let mut response = self.send(&request).await?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            self.capture_session_id(&response).await?;
            response = self.send(&request).await?;

            if response.status() == reqwest::StatusCode::CONFLICT {
                return Err(Error::handshake(format!(
                    "{} still rejected with HTTP 409 after session id refresh",
                    method
                )));
            }
        }

        match response.status() {
            reqwest::StatusCode::OK => {}
            reqwest::StatusCode::UNAUTHORIZED => {
                *self.session_id.write().await = None;
                return Err(Error::auth(format!("{} rejected credentials", method)));
            }
            other => return Err(Error::status(method, other.as_u16())),
        }

        let body = response.text().await?;
        tracing::debug!("{}: {} response={}", BACKEND_NAME, method, body);

        let decoded: RpcResponse = serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("{}: malformed response: {}", method, e)))?;

        if let Some(echoed) = decoded.tag {
            if echoed != tag {
                return Err(Error::protocol(format!(
                    "{}: response tag {} does not match request tag {}",
                    method, echoed, tag
                )));
            }
        }

        if decoded.result != RESULT_SUCCESS {
            return Err(Error::rpc(0, format!("{}: {}", method, decoded.result)));
        }

        Ok(decoded.arguments)
    }

    /// Read the current peer port settings
    async fn port_info(&self) -> Result<PortInfo> {
        let arguments = self
            .rpc(
                "session-get",
                json!({ "fields": ["peer-port", "peer-port-random-on-start"] }),
            )
            .await?;

        serde_json::from_value(arguments)
            .map_err(|e| Error::decode(format!("session-get: unexpected arguments: {}", e)))
    }
}

#[async_trait]
impl PortPusher for TransmissionPusher {
    async fn push(&self, desired: u16) -> Result<PushOutcome> {
        let info = self.port_info().await?;
        tracing::debug!("{}: current port info {:?}", BACKEND_NAME, info);

        if info.peer_port == desired && !info.peer_port_random {
            tracing::info!("{}: port is correct", BACKEND_NAME);
            return Ok(PushOutcome::Unchanged { port: desired });
        }

        tracing::info!(
            "{}: pushing port {}, current port is {}",
            BACKEND_NAME,
            desired,
            info.peer_port
        );

        self.rpc(
            "session-set",
            json!({
                "peer-port": desired,
                "peer-port-random-on-start": false,
            }),
        )
        .await?;

        tracing::info!("{}: port pushed", BACKEND_NAME);
        Ok(PushOutcome::Pushed {
            previous_port: Some(info.peer_port),
            port: desired,
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

/// Factory for creating Transmission backends
pub struct TransmissionFactory;

impl PortPusherFactory for TransmissionFactory {
    fn create(
        &self,
        config: &BackendConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortPusher>> {
        if config.kind != BackendKind::Transmission {
            return Err(Error::config("Invalid config for Transmission backend"));
        }
        config.validate()?;

        Ok(Box::new(TransmissionPusher::with_client(config, client)))
    }
}

/// Register the Transmission backend with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_pusher(BackendKind::Transmission, Box::new(TransmissionFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let config = BackendConfig::new(BackendKind::Transmission, "localhost");
        let pusher = TransmissionFactory.create(&config, reqwest::Client::new());

        assert!(pusher.is_ok());
        assert_eq!(pusher.unwrap().backend_name(), "transmission");
    }

    #[test]
    fn test_factory_rejects_other_kind() {
        let config = BackendConfig::new(BackendKind::Deluge, "localhost");
        assert!(TransmissionFactory
            .create(&config, reqwest::Client::new())
            .is_err());
    }

    #[test]
    fn test_rpc_url() {
        let config = BackendConfig::new(BackendKind::Transmission, "seedbox").with_port(9092);
        let pusher = TransmissionPusher::with_client(&config, reqwest::Client::new());

        assert_eq!(pusher.rpc_url, "http://seedbox:9092/transmission/rpc");
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let config = BackendConfig::new(BackendKind::Transmission, "localhost")
            .with_credentials("admin", "hunter2");
        let pusher = TransmissionPusher::with_client(&config, reqwest::Client::new());

        let debug_str = format!("{:?}", pusher);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn test_request_envelope_shape() {
        let request = RpcRequest {
            arguments: json!({ "fields": ["peer-port"] }),
            method: "session-get",
            tag: 7,
        };

        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["method"], "session-get");
        assert_eq!(encoded["tag"], 7);
        assert_eq!(encoded["arguments"]["fields"][0], "peer-port");
    }

    #[test]
    fn test_port_info_random_defaults_off() {
        let info: PortInfo = serde_json::from_value(json!({ "peer-port": 51413 })).unwrap();
        assert_eq!(info.peer_port, 51413);
        assert!(!info.peer_port_random);
    }
}
