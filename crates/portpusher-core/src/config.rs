//! Configuration types for the port pusher
//!
//! This module defines all configuration structures used throughout the workspace.
//! Values arrive here already parsed; `validate()` rejects combinations that
//! cannot work so the daemon fails before it enters the loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Main port pusher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PusherConfig {
    /// VPN sidecar location
    #[serde(default)]
    pub source: SourceConfig,

    /// Torrent client backends, in push order
    pub backends: Vec<BackendConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PusherConfig {
    /// Create a new configuration with defaults and no backends
    pub fn new() -> Self {
        Self {
            source: SourceConfig::default(),
            backends: Vec::new(),
            engine: EngineConfig::default(),
        }
    }

    /// Add a backend at the end of the push order
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.push(backend);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.backends.is_empty() {
            return Err(crate::Error::config(
                "No bittorrent clients are configured, nothing to do",
            ));
        }

        self.source.validate()?;

        for (i, backend) in self.backends.iter().enumerate() {
            backend.validate()?;
            if self.backends[..i].iter().any(|b| b.kind == backend.kind) {
                return Err(crate::Error::config(format!(
                    "{} is configured more than once",
                    backend.kind
                )));
            }
        }

        self.engine.validate()
    }
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// VPN sidecar (Gluetun control server) location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Host name or address
    #[serde(default = "default_source_host")]
    pub host: String,

    /// Control server port
    #[serde(default = "default_source_port")]
    pub port: u16,
}

impl SourceConfig {
    /// Create a source configuration
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the control server, without trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config("Sidecar host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Sidecar port must be > 0"));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            host: default_source_host(),
            port: default_source_port(),
        }
    }
}

fn default_source_host() -> String {
    "localhost".to_string()
}

fn default_source_port() -> u16 {
    8000
}

/// Torrent client protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Transmission RPC
    Transmission,
    /// qBittorrent WebUI API
    Qbittorrent,
    /// Deluge Web JSON-RPC
    Deluge,
}

impl BackendKind {
    /// All supported kinds, in the fixed push order
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Transmission,
        BackendKind::Qbittorrent,
        BackendKind::Deluge,
    ];

    /// Lowercase name used for registry lookups and logging
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Transmission => "transmission",
            BackendKind::Qbittorrent => "qbittorrent",
            BackendKind::Deluge => "deluge",
        }
    }

    /// Default WebUI / RPC port
    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::Transmission => 9091,
            BackendKind::Qbittorrent => 8080,
            BackendKind::Deluge => 8112,
        }
    }

    /// Default user name
    pub fn default_username(&self) -> &'static str {
        "admin"
    }

    /// Default password (the client's stock install password)
    pub fn default_password(&self) -> &'static str {
        match self {
            BackendKind::Transmission => "password",
            BackendKind::Qbittorrent => "adminadmin",
            BackendKind::Deluge => "deluge",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend configuration
///
/// The Debug implementation intentionally does NOT expose the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which protocol to speak
    pub kind: BackendKind,

    /// Host name or address
    pub host: String,

    /// WebUI / RPC port
    pub port: u16,

    /// User name (not used by Deluge)
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,
}

impl BackendConfig {
    /// Create a backend configuration with the kind's default port and credentials
    pub fn new(kind: BackendKind, host: impl Into<String>) -> Self {
        Self {
            kind,
            host: host.into(),
            port: kind.default_port(),
            username: Some(kind.default_username().to_string()),
            password: Some(kind.default_password().to_string()),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the credentials
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Base URL of the backend, without trailing slash
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// User name, or empty when none is configured
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }

    /// Password, or empty when none is configured
    pub fn password(&self) -> &str {
        self.password.as_deref().unwrap_or_default()
    }

    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.is_empty() {
            return Err(crate::Error::config(format!(
                "{} host cannot be empty",
                self.kind
            )));
        }
        if self.port == 0 {
            return Err(crate::Error::config(format!(
                "{} port must be > 0",
                self.kind
            )));
        }
        Ok(())
    }
}

// Custom Debug implementation that hides the password
impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay after an iteration in which every step succeeded (in seconds)
    #[serde(default = "default_delay_success_secs")]
    pub delay_success_secs: u64,

    /// Delay after an iteration in which the pull or any push failed (in seconds)
    #[serde(default = "default_delay_error_secs")]
    pub delay_error_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Delay used after a fully successful iteration
    pub fn delay_success(&self) -> Duration {
        Duration::from_secs(self.delay_success_secs)
    }

    /// Delay used after an iteration with any failure
    pub fn delay_error(&self) -> Duration {
        Duration::from_secs(self.delay_error_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.delay_success_secs == 0 {
            return Err(crate::Error::config("Success delay must be > 0"));
        }
        if self.delay_error_secs == 0 {
            return Err(crate::Error::config("Error delay must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delay_success_secs: default_delay_success_secs(),
            delay_error_secs: default_delay_error_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_delay_success_secs() -> u64 {
    10 * 60
}

fn default_delay_error_secs() -> u64 {
    5 * 60
}

fn default_event_channel_capacity() -> usize {
    100
}
