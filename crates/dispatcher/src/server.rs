//! Entry point tying a [`Dispatcher`] and a [`ServerConfig`] to the reactor.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use micro_http::connection::ConnectionSettings;
use micro_http::server::{HttpServer, ServerSettings};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::adapter::DispatchHooks;
use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;

#[derive(Debug)]
pub struct ServerBuilder {
    dispatcher: Option<Dispatcher>,
    config: ServerConfig,
    shutdown: Option<CancellationToken>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { dispatcher: None, config: ServerConfig::default(), shutdown: None }
    }

    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Token stopping the server once cancelled, a fresh one is used if unset.
    pub fn shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Validates the config and binds the listening socket.
    pub fn build(self) -> Result<Server, ServerError> {
        let dispatcher = self.dispatcher.ok_or(ServerError::MissingDispatcher)?;
        self.config.validate()?;

        let settings = ServerSettings {
            address: self.config.socket_addr(),
            worker_threads: self.config.http_threads,
            backlog: self.config.backlog,
            connection: ConnectionSettings {
                read_timeout: self.config.read_timeout,
                write_timeout: self.config.write_timeout,
                max_body_size: Some(self.config.max_body_size),
                max_keepalive_requests: self.config.max_keepalive_requests,
            },
        };

        let hooks = DispatchHooks::new(Arc::new(dispatcher), self.config.clone());
        let mut inner = HttpServer::bind(settings, hooks)?;
        if let Some(token) = self.shutdown {
            inner = inner.with_shutdown(token);
        }

        Ok(Server { inner, config: self.config })
    }
}

pub struct Server {
    inner: HttpServer<DispatchHooks>,
    config: ServerConfig,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("local_addr", &self.local_addr()).field("config", &self.config).finish_non_exhaustive()
    }
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown_token()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serves until the shutdown token is cancelled, blocking the calling thread.
    pub fn run(self) -> Result<(), ServerError> {
        info!(address = ?self.local_addr(), http_threads = self.config.http_threads, "starting dispatcher");
        self.inner.run()?;
        Ok(())
    }
}
