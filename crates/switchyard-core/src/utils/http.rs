//! HTTP client construction.

use reqwest::Client;

/// Create HTTP client with the given timeout and keepalive settings.
pub fn create_client(timeout_secs: u64) -> Result<Client, String> {
    base_builder(timeout_secs).build().map_err(|e| format!("HTTP client builder failed: {e}"))
}

/// Shared builder with keepalive settings.
fn base_builder(timeout_secs: u64) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .tcp_nodelay(true)
        .http2_keep_alive_interval(std::time::Duration::from_secs(25))
        .http2_keep_alive_timeout(std::time::Duration::from_secs(10))
        .http2_keep_alive_while_idle(true)
}
