//! Plugin-based backend registry
//!
//! The registry allows backends and port sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use portpusher_core::registry::BackendRegistry;
//! use portpusher_core::config::{BackendConfig, BackendKind};
//!
//! let registry = BackendRegistry::new();
//! portpusher_backend_deluge::register(&registry);
//!
//! let config = BackendConfig::new(BackendKind::Deluge, "localhost");
//! let pusher = registry.create_pusher(&config, portpusher_core::transport::client()?)?;
//! ```

use crate::config::{BackendConfig, BackendKind, SourceConfig};
use crate::error::{Error, Result};
use crate::traits::{PortPusher, PortPusherFactory, PortSource, PortSourceFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry for plugin-based backend and port source creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct BackendRegistry {
    /// Registered backend factories, keyed by protocol
    pushers: RwLock<HashMap<BackendKind, Box<dyn PortPusherFactory>>>,

    /// Registered port source factories, keyed by name
    sources: RwLock<HashMap<String, Box<dyn PortSourceFactory>>>,
}

impl BackendRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend factory
    ///
    /// Registering the same kind twice replaces the earlier factory.
    pub fn register_pusher(&self, kind: BackendKind, factory: Box<dyn PortPusherFactory>) {
        let mut pushers = self.pushers.write().unwrap_or_else(PoisonError::into_inner);
        pushers.insert(kind, factory);
    }

    /// Register a port source factory
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn PortSourceFactory>) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Create a backend from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn PortPusher>)`: Created backend instance
    /// - `Err(Error::Config)`: If the kind is not registered or creation fails
    pub fn create_pusher(
        &self,
        config: &BackendConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortPusher>> {
        let pushers = self.pushers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = pushers.get(&config.kind).ok_or_else(|| {
            Error::config(format!("Backend {} is not available in this build", config.kind))
        })?;

        factory.create(config, client)
    }

    /// Create one backend per configured entry, preserving order
    pub fn create_pushers(
        &self,
        configs: &[BackendConfig],
        client: &reqwest::Client,
    ) -> Result<Vec<Box<dyn PortPusher>>> {
        configs
            .iter()
            .map(|config| self.create_pusher(config, client.clone()))
            .collect()
    }

    /// Create a port source from configuration
    pub fn create_source(
        &self,
        name: &str,
        config: &SourceConfig,
        client: reqwest::Client,
    ) -> Result<Box<dyn PortSource>> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(name)
            .ok_or_else(|| Error::config(format!("Unknown port source type: {}", name)))?;

        factory.create(config, client)
    }

    /// Check if a backend kind is registered
    pub fn has_pusher(&self, kind: BackendKind) -> bool {
        let pushers = self.pushers.read().unwrap_or_else(PoisonError::into_inner);
        pushers.contains_key(&kind)
    }

    /// Check if a port source name is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// List all registered backend kinds, in push order
    pub fn list_pushers(&self) -> Vec<BackendKind> {
        let pushers = self.pushers.read().unwrap_or_else(PoisonError::into_inner);
        BackendKind::ALL
            .into_iter()
            .filter(|kind| pushers.contains_key(kind))
            .collect()
    }
}
