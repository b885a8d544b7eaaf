//! Core traits for the port pusher
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`PortSource`]: Pull the currently forwarded port from the VPN sidecar
//! - [`PortPusher`]: Reconcile one torrent client's listen port with a desired port

pub mod port_source;
pub mod port_pusher;

pub use port_source::{PortSource, PortSourceFactory};
pub use port_pusher::{PortPusher, PortPusherFactory, PushOutcome};
