use std::time::Duration;

/// Per-connection limits, adjustable by [`ConnectionHooks::on_post_accept`](crate::hook::ConnectionHooks::on_post_accept).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// how long to wait for the next request head or body bytes
    pub read_timeout: Duration,
    /// how long a pending write may make no progress
    pub write_timeout: Duration,
    /// largest accepted request body, `None` for unlimited
    pub max_body_size: Option<u64>,
    /// requests served before the connection is closed, `None` for unlimited
    pub max_keepalive_requests: Option<usize>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            max_body_size: None,
            max_keepalive_requests: None,
        }
    }
}
