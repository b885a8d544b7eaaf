// # portpusher-core
//
// Core library for keeping torrent client listen ports in sync with the
// port a VPN sidecar forwards.
//
// ## Architecture Overview
//
// - **PortSource**: Trait for pulling the forwarded port from the sidecar
// - **PortPusher**: Trait for reconciling one torrent client's listen port
// - **PushEngine**: Loop that pulls, pushes to every backend, then backs off
// - **BackendRegistry**: Plugin-based registry for backends and port sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Protocol adapters live in their own crates
// 2. **Sequential**: One pull, then one push per backend, in a fixed order
// 3. **Plugin-Based**: Backends are registered dynamically, no hard-coded if-else
// 4. **Idempotency**: Backends read before they write and only write on mismatch

pub mod traits;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;
pub mod transport;

// Re-export core types for convenience
pub use traits::{PortPusher, PortSource, PushOutcome};
pub use engine::{EngineEvent, IterationReport, PushEngine};
pub use registry::BackendRegistry;
pub use config::{BackendConfig, BackendKind, EngineConfig, PusherConfig, SourceConfig};
pub use error::{Error, Result};
