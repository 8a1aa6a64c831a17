use std::io;
use std::net::SocketAddr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {address}, cause: {source}")]
    Bind { address: SocketAddr, source: io::Error },

    #[error("can't build runtime, cause: {source}")]
    Runtime { source: io::Error },

    #[error("can't spawn worker thread, cause: {source}")]
    Spawn { source: io::Error },

    #[error("invalid server settings: {reason}")]
    InvalidSettings { reason: String },
}

impl ServerError {
    pub fn bind(address: SocketAddr, source: io::Error) -> Self {
        Self::Bind { address, source }
    }

    pub fn invalid_settings<S: ToString>(str: S) -> Self {
        Self::InvalidSettings { reason: str.to_string() }
    }
}
