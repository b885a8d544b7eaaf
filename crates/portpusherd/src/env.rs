//! Environment configuration
//!
//! Every setting has a default; a malformed value is a startup error.

use anyhow::{Context, Result};
use portpusher_core::config::{BackendConfig, BackendKind, EngineConfig, SourceConfig};
use portpusher_core::PusherConfig;
use tracing::Level;

const ENV_LOG_LEVEL: &str = "PUSHER_LOG_LEVEL";
const ENV_DELAY_SUCCESS: &str = "PUSHER_DELAY_SUCCESS";
const ENV_DELAY_ERROR: &str = "PUSHER_DELAY_ERROR";
const ENV_GLUETUN_HOST: &str = "GLUETUN_HOST";
const ENV_GLUETUN_PORT: &str = "GLUETUN_PORT";

const DEFAULT_DELAY_SUCCESS_MINS: u64 = 10;
const DEFAULT_DELAY_ERROR_MINS: u64 = 5;
const DEFAULT_HOST: &str = "localhost";

/// Daemon configuration
#[derive(Debug)]
pub struct Config {
    pub log_level: Level,
    pub pusher: PusherConfig,
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_level = parse_log_level(lookup(ENV_LOG_LEVEL).as_deref())?;

        let engine = EngineConfig {
            delay_success_secs: minutes(&lookup, ENV_DELAY_SUCCESS, DEFAULT_DELAY_SUCCESS_MINS)?,
            delay_error_secs: minutes(&lookup, ENV_DELAY_ERROR, DEFAULT_DELAY_ERROR_MINS)?,
            ..EngineConfig::default()
        };

        let source = SourceConfig::new(
            lookup(ENV_GLUETUN_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port(&lookup, ENV_GLUETUN_PORT, SourceConfig::default().port)?,
        );

        let mut pusher = PusherConfig {
            source,
            backends: Vec::new(),
            engine,
        };

        for kind in BackendKind::ALL {
            if let Some(backend) = backend(&lookup, kind)? {
                pusher.backends.push(backend);
            }
        }

        Ok(Self { log_level, pusher })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pusher.validate().map_err(anyhow::Error::from)
    }
}

/// Environment variable prefix of a backend kind
fn prefix(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::Transmission => "TRANSMISSION",
        BackendKind::Qbittorrent => "QBITTORRENT",
        BackendKind::Deluge => "DELUGE",
    }
}

/// Read one backend, or `None` when it is not enabled
fn backend(
    lookup: &impl Fn(&str) -> Option<String>,
    kind: BackendKind,
) -> Result<Option<BackendConfig>> {
    let prefix = prefix(kind);

    let enabled = lookup(&format!("{}_ENABLED", prefix))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if !enabled {
        tracing::debug!("{} disabled", kind);
        return Ok(None);
    }

    let host = lookup(&format!("{}_HOST", prefix)).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = port(lookup, &format!("{}_PORT", prefix), kind.default_port())?;
    let username = lookup(&format!("{}_USER", prefix))
        .unwrap_or_else(|| kind.default_username().to_string());
    let password = lookup(&format!("{}_PASS", prefix))
        .unwrap_or_else(|| kind.default_password().to_string());

    Ok(Some(
        BackendConfig::new(kind, host)
            .with_port(port)
            .with_credentials(username, password),
    ))
}

fn parse_log_level(value: Option<&str>) -> Result<Level> {
    let Some(value) = value else {
        return Ok(Level::INFO);
    };

    match value.to_ascii_uppercase().as_str() {
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "env.{} has invalid value {}. Valid values are DEBUG, INFO, WARN, ERROR",
            ENV_LOG_LEVEL,
            value
        ),
    }
}

/// Read a delay in whole minutes and return it in seconds
fn minutes(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    let mins = match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(m) if m > 0 => m,
            _ => anyhow::bail!(
                "env.{} has invalid value: {}. Valid values are any number of minutes > 0",
                key,
                raw
            ),
        },
    };

    mins.checked_mul(60)
        .with_context(|| format!("env.{} is too large: {} minutes", key, mins))
}

fn port(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> Result<u16> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u16>() {
            Ok(p) if p > 0 => Ok(p),
            _ => anyhow::bail!("invalid port number found in env.{}: {}", key, raw),
        },
    }
}
