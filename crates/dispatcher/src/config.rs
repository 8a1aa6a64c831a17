use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::ServerError;

/// Server configuration, passed to [`Server::builder`](crate::Server::builder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// number of reactor worker threads
    pub http_threads: usize,
    pub backlog: i32,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// largest accepted request body in bytes
    pub max_body_size: u64,
    /// backpressure ceiling for queued response bytes
    pub max_pending_bytes: usize,
    /// requests served per connection, `None` for unlimited
    pub max_keepalive_requests: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8889,
            http_threads: 17,
            backlog: 512,
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            max_body_size: 8 * 1024,
            max_pending_bytes: 10_000_000,
            max_keepalive_requests: None,
        }
    }
}

impl ServerConfig {
    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = address;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_http_threads(mut self, http_threads: usize) -> Self {
        self.http_threads = http_threads;
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: u64) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn with_max_pending_bytes(mut self, max_pending_bytes: usize) -> Self {
        self.max_pending_bytes = max_pending_bytes;
        self
    }

    pub fn with_max_keepalive_requests(mut self, max_keepalive_requests: Option<usize>) -> Self {
        self.max_keepalive_requests = max_keepalive_requests;
        self
    }

    #[inline]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.http_threads == 0 {
            return Err(ServerError::invalid_config("http_threads must be at least 1"));
        }
        if self.backlog <= 0 {
            return Err(ServerError::invalid_config(format!("backlog must be positive, got {}", self.backlog)));
        }
        if self.read_timeout.is_zero() || self.write_timeout.is_zero() {
            return Err(ServerError::invalid_config("read and write timeouts must be non zero"));
        }
        if self.max_pending_bytes == 0 {
            return Err(ServerError::invalid_config("max_pending_bytes must be positive"));
        }
        if self.max_keepalive_requests == Some(0) {
            return Err(ServerError::invalid_config("max_keepalive_requests must be positive when set"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr(), "0.0.0.0:8889".parse().unwrap());
        assert_eq!(config.http_threads, 17);
        assert_eq!(config.max_body_size, 8192);
        assert_eq!(config.max_pending_bytes, 10_000_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(ServerConfig::default().with_http_threads(0).validate().is_err());
        assert!(ServerConfig::default().with_backlog(0).validate().is_err());
        assert!(ServerConfig::default().with_write_timeout(Duration::ZERO).validate().is_err());
        assert!(ServerConfig::default().with_max_pending_bytes(0).validate().is_err());
        assert!(ServerConfig::default().with_max_keepalive_requests(Some(0)).validate().is_err());
    }
}
