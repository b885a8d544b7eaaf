//! Deluge Web JSON-RPC wire types
//!
//! Deluge answers several methods with positional arrays instead of
//! objects. Those are decoded here into fixed-shape records with explicit
//! length and type checks.

use portpusher_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host status reported for a daemon that accepts connections
pub const STATUS_ONLINE: &str = "Online";

/// JSON-RPC request envelope
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    pub params: Vec<Value>,
    pub id: u64,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcError>,
    pub id: u64,
}

/// Error object carried in a response
#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// One entry of `web.get_hosts`
///
/// Wire form: `["<id>", "<address>", <port>, "<hostname>"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub hostname: String,
}

impl HostEntry {
    /// Decode a positional host entry
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = positional(value, 4, "host entry")?;

        Ok(Self {
            id: string_at(fields, 0, "host entry")?,
            address: string_at(fields, 1, "host entry")?,
            port: fields[2]
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| {
                    Error::decode(format!("host entry: invalid port {}", fields[2]))
                })?,
            hostname: string_at(fields, 3, "host entry")?,
        })
    }

    /// Decode the whole `web.get_hosts` result
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>> {
        value
            .as_array()
            .ok_or_else(|| Error::decode(format!("web.get_hosts: expected array, got {}", value)))?
            .iter()
            .map(Self::from_value)
            .collect()
    }
}

/// Result of `web.get_host_status`
///
/// Wire form: `["<id>", "<status>", "<version>"]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStatus {
    pub id: String,
    pub status: String,
    pub version: String,
}

impl HostStatus {
    /// Decode a positional host status
    pub fn from_value(value: &Value) -> Result<Self> {
        let fields = positional(value, 3, "host status")?;

        Ok(Self {
            id: string_at(fields, 0, "host status")?,
            status: string_at(fields, 1, "host status")?,
            version: string_at(fields, 2, "host status")?,
        })
    }

    pub fn is_online(&self) -> bool {
        self.status == STATUS_ONLINE
    }
}

/// The subset of `core.get_config` the pusher needs
#[derive(Debug, Clone, Deserialize)]
pub struct CoreConfig {
    pub listen_ports: Vec<u16>,
    #[serde(default)]
    pub random_port: bool,
}

impl CoreConfig {
    /// The configured listen port (first of the range)
    pub fn listen_port(&self) -> Result<u16> {
        self.listen_ports
            .first()
            .copied()
            .ok_or_else(|| Error::decode("core.get_config: listen_ports is empty"))
    }
}

fn positional<'a>(value: &'a Value, min_len: usize, what: &str) -> Result<&'a [Value]> {
    let fields = value
        .as_array()
        .ok_or_else(|| Error::decode(format!("{}: expected array, got {}", what, value)))?;

    if fields.len() < min_len {
        return Err(Error::decode(format!(
            "{}: expected at least {} fields, got {}",
            what,
            min_len,
            fields.len()
        )));
    }

    Ok(fields)
}

fn string_at(fields: &[Value], index: usize, what: &str) -> Result<String> {
    fields[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            Error::decode(format!(
                "{}: field {} is not a string: {}",
                what, index, fields[index]
            ))
        })
}
