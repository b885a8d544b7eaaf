// # qBittorrent Backend
//
// This crate pushes the forwarded port into qBittorrent through its WebUI
// API (v2).
//
// ## Session
//
// The WebUI authenticates with a cookie (`SID`) issued by
// `POST /api/v2/auth/login`. The pusher never handles the cookie itself;
// the HTTP client it is given must have a cookie store so the session
// carries over to the following requests. `portpusher_core::transport::client()`
// builds such a client.
//
// ## Flow
//
// 1. Login (form `username`, `password`, with a `Referer` header)
// 2. `GET /api/v2/app/preferences`
// 3. `POST /api/v2/app/setPreferences` only when `listen_port` differs or
//    `random_port` is enabled
//
// ## API Reference
//
// - https://github.com/qbittorrent/qBittorrent/wiki/WebUI-API-(qBittorrent-4.1)

use async_trait::async_trait;
use portpusher_core::config::{BackendConfig, BackendKind};
use portpusher_core::traits::{PortPusher, PortPusherFactory, PushOutcome};
use portpusher_core::{BackendRegistry, Error, Result};
use serde::{Deserialize, Serialize};

/// Name used in logs and reports
const BACKEND_NAME: &str = "qbittorrent";

/// Body the WebUI answers a rejected login with (still HTTP 200)
const LOGIN_REJECTED: &str = "Fails.";

/// The subset of WebUI preferences the pusher reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Incoming connections port
    pub listen_port: u16,

    /// Pick a random port on every start
    #[serde(default)]
    pub random_port: bool,
}

/// qBittorrent WebUI backend
pub struct QbittorrentPusher {
    /// WebUI base URL, also sent as `Referer`
    base_url: String,

    /// WebUI user name
    username: String,

    /// WebUI password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client, must carry a cookie store
    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for QbittorrentPusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QbittorrentPusher")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl QbittorrentPusher {
    /// Create a qBittorrent backend with its own cookie-enabled HTTP client
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self::with_client(
            config,
            portpusher_core::transport::client()?,
        ))
    }

    /// Create a qBittorrent backend on a shared HTTP client
    ///
    /// The client must have been built with a cookie store, otherwise every
    /// request after login is rejected with HTTP 403.
    pub fn with_client(config: &BackendConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url(),
            username: config.username().to_string(),
            password: config.password().to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in and obtain the session cookie
    async fn login(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .header(reqwest::header::REFERER, &self.base_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status("login", status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim() == LOGIN_REJECTED {
            return Err(Error::auth("login rejected, check user name and password"));
        }

        tracing::debug!("{}: login OK", BACKEND_NAME);
        Ok(())
    }

    /// Read the current preferences
    async fn preferences(&self) -> Result<Preferences> {
        let response = self
            .client
            .get(self.url("/api/v2/app/preferences"))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status("preferences", status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("preferences: malformed response: {}", e)))
    }

    /// Write new preferences
    async fn set_preferences(&self, prefs: &Preferences) -> Result<()> {
        let encoded = serde_json::to_string(prefs)?;
        let response = self
            .client
            .post(self.url("/api/v2/app/setPreferences"))
            .form(&[("json", encoded.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::status("setPreferences", status.as_u16()));
        }

        Ok(())
    }
}

#[async_trait]
impl PortPusher for QbittorrentPusher {
    async fn push(&self, desired: u16) -> Result<PushOutcome> {
        self.login().await?;

        let current = self.preferences().await?;
        tracing::debug!("{}: current preferences {:?}", BACKEND_NAME, current);

        if current.listen_port == desired && !current.random_port {
            tracing::info!("{}: port is correct", BACKEND_NAME);
            return Ok(PushOutcome::Unchanged { port: desired });
        }

        tracing::info!(
            "{}: pushing port {}, current port is {}",
            BACKEND_NAME,
            desired,
            current.listen_port
        );

        self.set_preferences(&Preferences {
            listen_port: desired,
            random_port: false,
        })
        .await?;

        tracing::info!("{}: port pushed", BACKEND_NAME);
        Ok(PushOutcome::Pushed {
            previous_port: Some(current.listen_port),
            port: desired,
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}

/// Factory for creating qBittorrent backends
pub struct QbittorrentFactory;

impl PortPusherFactory for QbittorrentFactory {
    fn create(
        &self,
        config: &BackendConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortPusher>> {
        if config.kind != BackendKind::Qbittorrent {
            return Err(Error::config("Invalid config for qBittorrent backend"));
        }
        config.validate()?;

        Ok(Box::new(QbittorrentPusher::with_client(config, client)))
    }
}

/// Register the qBittorrent backend with a registry
pub fn register(registry: &BackendRegistry) {
    registry.register_pusher(BackendKind::Qbittorrent, Box::new(QbittorrentFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_creation() {
        let registry = BackendRegistry::new();
        register(&registry);

        let config = BackendConfig::new(BackendKind::Qbittorrent, "localhost");
        let pusher = registry
            .create_pusher(&config, reqwest::Client::new())
            .unwrap();
        assert_eq!(pusher.backend_name(), "qbittorrent");
    }

    #[test]
    fn test_preferences_wire_format() {
        let prefs = Preferences {
            listen_port: 12345,
            random_port: false,
        };

        assert_eq!(
            serde_json::to_string(&prefs).unwrap(),
            r#"{"listen_port":12345,"random_port":false}"#
        );
    }

    #[test]
    fn test_preferences_ignore_unrelated_fields() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"locale":"en","listen_port":6881,"random_port":true,"upnp":false}"#)
                .unwrap();

        assert_eq!(prefs.listen_port, 6881);
        assert!(prefs.random_port);
    }

    #[test]
    fn test_password_not_exposed_in_debug() {
        let config = BackendConfig::new(BackendKind::Qbittorrent, "localhost")
            .with_credentials("admin", "hunter2");
        let pusher = QbittorrentPusher::with_client(&config, reqwest::Client::new());

        assert!(!format!("{:?}", pusher).contains("hunter2"));
    }
}
