//! Multi-threaded listener serving [`HttpConnection`]s.
//!
//! One acceptor thread owns the listening socket and runs
//! [`ConnectionHooks::on_pre_accept`] for every accepted socket, which is then handed
//! round-robin to a worker thread. Every worker runs a current-thread runtime
//! with a [`LocalSet`], so the connections of a worker, and the per-request state
//! they own, never leave that thread.

mod error;

pub use error::ServerError;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio::select;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectionSettings, HttpConnection};
use crate::hook::{ConnectionHooks, HookStatus};

type Handoff = (std::net::TcpStream, SocketAddr);

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub address: SocketAddr,
    pub worker_threads: usize,
    pub backlog: i32,
    pub connection: ConnectionSettings,
}

impl ServerSettings {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, worker_threads: 1, backlog: 512, connection: ConnectionSettings::default() }
    }
}

pub struct HttpServer<H> {
    settings: ServerSettings,
    hooks: Arc<H>,
    listener: std::net::TcpListener,
    shutdown: CancellationToken,
}

impl<H> std::fmt::Debug for HttpServer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer").field("settings", &self.settings).field("listener", &self.listener).finish_non_exhaustive()
    }
}

impl<H> HttpServer<H>
where
    H: ConnectionHooks + Send + Sync + 'static,
{
    /// Binds the listening socket, the server starts accepting in [`run`](HttpServer::run).
    pub fn bind(settings: ServerSettings, hooks: H) -> Result<Self, ServerError> {
        if settings.worker_threads == 0 {
            return Err(ServerError::invalid_settings("worker_threads must be at least 1"));
        }

        let listener = bind_listener(settings.address, settings.backlog).map_err(|e| ServerError::bind(settings.address, e))?;
        Ok(Self { settings, hooks: Arc::new(hooks), listener, shutdown: CancellationToken::new() })
    }

    /// Uses `token` to stop the server instead of an internal one.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Serves until the shutdown token is cancelled, blocking the calling thread.
    ///
    /// Idle connections are closed on shutdown, in-flight exchanges are completed
    /// before the workers exit.
    pub fn run(self) -> Result<(), ServerError> {
        let HttpServer { settings, hooks, listener, shutdown } = self;

        let runtime = Builder::new_current_thread().enable_all().build().map_err(|source| ServerError::Runtime { source })?;

        let mut senders = Vec::with_capacity(settings.worker_threads);
        let mut workers = Vec::with_capacity(settings.worker_threads);
        for index in 0..settings.worker_threads {
            let (sender, receiver) = unbounded_channel::<Handoff>();
            let worker = spawn_worker(index, receiver, hooks.clone(), settings.connection.clone(), shutdown.clone());
            match worker {
                Ok(worker) => {
                    senders.push(sender);
                    workers.push(worker);
                }
                Err(e) => {
                    shutdown.cancel();
                    drop(senders);
                    join_workers(workers);
                    return Err(e);
                }
            }
        }

        let result = runtime.block_on(accept_loop(listener, hooks.as_ref(), &senders, &shutdown));

        drop(senders);
        join_workers(workers);
        info!("server stopped");
        result
    }
}

fn bind_listener(address: SocketAddr, backlog: i32) -> std::io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&address.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

async fn accept_loop<H>(
    listener: std::net::TcpListener,
    hooks: &H,
    senders: &[UnboundedSender<Handoff>],
    shutdown: &CancellationToken,
) -> Result<(), ServerError>
where
    H: ConnectionHooks,
{
    let address = listener.local_addr().ok();
    let listener = TcpListener::from_std(listener).map_err(|source| ServerError::Runtime { source })?;
    info!(address = ?address, workers = senders.len(), "start listening");

    let mut next = 0usize;
    loop {
        let (tcp_stream, remote_addr) = select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            },
        };

        if hooks.on_pre_accept(&tcp_stream) == HookStatus::Reject {
            debug!(peer = %remote_addr, "connection rejected before accept");
            continue;
        }

        let std_stream = match tcp_stream.into_std() {
            Ok(std_stream) => std_stream,
            Err(e) => {
                warn!(cause = %e, peer = %remote_addr, "can't detach accepted socket");
                continue;
            }
        };

        if senders[next].send((std_stream, remote_addr)).is_err() {
            error!(worker = next, "worker is gone, dropping connection");
        }
        next = (next + 1) % senders.len();
    }
}

fn spawn_worker<H>(
    index: usize,
    receiver: UnboundedReceiver<Handoff>,
    hooks: Arc<H>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, ServerError>
where
    H: ConnectionHooks + Send + Sync + 'static,
{
    let runtime: Runtime = Builder::new_current_thread().enable_all().build().map_err(|source| ServerError::Runtime { source })?;

    std::thread::Builder::new()
        .name(format!("http-worker-{index}"))
        .spawn(move || {
            let local = LocalSet::new();
            local.block_on(&runtime, serve_connections(receiver, hooks, settings, shutdown));
            // let in-flight exchanges complete
            runtime.block_on(local);
            debug!(worker = index, "worker stopped");
        })
        .map_err(|source| ServerError::Spawn { source })
}

async fn serve_connections<H>(
    mut receiver: UnboundedReceiver<Handoff>,
    hooks: Arc<H>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) where
    H: ConnectionHooks + 'static,
{
    while let Some((std_stream, remote_addr)) = receiver.recv().await {
        let tcp_stream = match TcpStream::from_std(std_stream) {
            Ok(tcp_stream) => tcp_stream,
            Err(e) => {
                warn!(cause = %e, peer = %remote_addr, "can't register connection");
                continue;
            }
        };

        let hooks = hooks.clone();
        let settings = settings.clone();
        let shutdown = shutdown.clone();
        tokio::task::spawn_local(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection =
                HttpConnection::new(reader, writer).with_settings(settings).with_peer_addr(remote_addr).with_shutdown(shutdown);
            match connection.process(hooks.as_ref()).await {
                Ok(_) => {
                    info!("finished process, connection shutdown");
                }
                Err(e) => {
                    error!("service has error, cause {}, connection shutdown", e);
                }
            }
        });
    }
}

fn join_workers(workers: Vec<JoinHandle<()>>) {
    for worker in workers {
        let name = worker.thread().name().map(str::to_owned);
        if worker.join().is_err() {
            error!(worker = ?name, "worker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Exchange;
    use crate::hook::ErrorFlags;
    use bytes::Bytes;
    use http::StatusCode;
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Hello {
        finished: AtomicUsize,
    }

    impl ConnectionHooks for Hello {
        type Request = ();

        fn on_headers(&self, _exchange: &mut Exchange) -> Option<()> {
            Some(())
        }

        fn on_request(&self, exchange: &mut Exchange, _request: Option<&mut ()>) {
            let body = format!("hello {}", exchange.path());
            exchange.send_reply(StatusCode::OK, Bytes::from(body)).unwrap();
        }

        fn on_write(&self, _exchange: &mut Exchange, _request: &mut ()) {}

        fn on_error(&self, _exchange: &Exchange, _flags: ErrorFlags, _request: &mut ()) {}

        fn on_finish(&self, _exchange: &mut Exchange, _request: ()) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn rejects_zero_workers() {
        let mut settings = ServerSettings::new("127.0.0.1:0".parse().unwrap());
        settings.worker_threads = 0;
        assert!(matches!(HttpServer::bind(settings, Hello::default()), Err(ServerError::InvalidSettings { .. })));
    }

    #[test]
    fn serves_and_stops() {
        let mut settings = ServerSettings::new("127.0.0.1:0".parse().unwrap());
        settings.worker_threads = 2;
        let server = HttpServer::bind(settings, Hello::default()).unwrap();
        let address = server.local_addr().unwrap();
        let shutdown = server.shutdown_token();
        let handle = std::thread::spawn(move || server.run());

        for path in ["/a", "/b", "/c"] {
            let mut stream = std::net::TcpStream::connect(address).unwrap();
            write!(stream, "GET {path} HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).unwrap();
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
            assert!(response.ends_with(&format!("hello {path}")));
        }

        shutdown.cancel();
        assert!(handle.join().unwrap().is_ok());
    }
}
