//! Shared HTTP transport
//!
//! Every adapter is constructed with a `reqwest::Client`. Backends that keep
//! their session in a cookie (qBittorrent, Deluge) only work when that client
//! has a cookie store, so this is the one place clients get built.

use std::time::Duration;

/// User-Agent sent with every request
pub const USER_AGENT: &str = "Port Pusher";

/// Default HTTP timeout for a single request (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a cookie-enabled client suitable for every adapter
///
/// One client can be shared by all adapters. Cookies are scoped by host,
/// not port, but qBittorrent (`SID`) and Deluge (`_session_id`) use
/// different cookie names so their sessions do not collide.
pub fn client() -> crate::Result<reqwest::Client> {
    client_with_timeout(DEFAULT_HTTP_TIMEOUT)
}

/// Build a cookie-enabled client with a custom timeout
pub fn client_with_timeout(timeout: Duration) -> crate::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .timeout(timeout)
        .build()
        .map_err(|e| crate::Error::config(format!("Failed to build HTTP client: {}", e)))
}
