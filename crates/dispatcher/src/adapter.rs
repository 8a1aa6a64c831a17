//! Reactor hooks creating, driving and releasing request handles.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use micro_http::connection::{ConnectionSettings, Exchange};
use micro_http::hook::{ConnectionHooks, ErrorFlags, HookStatus};
use socket2::SockRef;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::Dispatcher;
use crate::request::{HttpRequest, Phase, RequestHandle};

/// [`ConnectionHooks`] routing every request through a [`Dispatcher`].
#[derive(Debug)]
pub struct DispatchHooks {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl DispatchHooks {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }
}

impl ConnectionHooks for DispatchHooks {
    type Request = RequestHandle;

    fn on_pre_accept(&self, stream: &TcpStream) -> HookStatus {
        let socket = SockRef::from(stream);
        if let Err(e) = socket.set_read_timeout(Some(self.config.read_timeout)) {
            warn!(cause = %e, "can't set socket read timeout");
        }
        if let Err(e) = socket.set_write_timeout(Some(self.config.write_timeout)) {
            warn!(cause = %e, "can't set socket write timeout");
        }
        HookStatus::Proceed
    }

    fn on_post_accept(&self, settings: &mut ConnectionSettings) -> HookStatus {
        settings.read_timeout = self.config.read_timeout;
        settings.write_timeout = self.config.write_timeout;
        settings.max_body_size = Some(self.config.max_body_size);
        settings.max_keepalive_requests = self.config.max_keepalive_requests;
        HookStatus::Proceed
    }

    fn on_headers(&self, exchange: &mut Exchange) -> Option<RequestHandle> {
        info!("{}", exchange.short_description());
        Some(RequestHandle::new(self.config.max_pending_bytes))
    }

    fn on_request(&self, exchange: &mut Exchange, request: Option<&mut RequestHandle>) {
        let Some(handle) = request else {
            error!(request = %exchange.short_description(), "no request handle attached");
            if let Err(e) = exchange.send_reply(StatusCode::NOT_FOUND, Bytes::new()) {
                warn!(cause = %e, request = %exchange.short_description(), "failed to send not found reply");
            }
            return;
        };

        let path = exchange.path().to_owned();
        let mut request = HttpRequest::new(exchange, handle);
        if !self.dispatcher.route(&path, Some(&mut request)) {
            debug!(path = %path, "no handler found");
            request.reply(Bytes::new(), StatusCode::NOT_FOUND);
            return;
        }

        if request.is_done() || request.has_write_continuation() {
            return;
        }

        match request.phase() {
            Phase::Created => {
                warn!(path = %path, "handler returned without a response");
                request.reply(Bytes::new(), StatusCode::INTERNAL_SERVER_ERROR);
            }
            phase => {
                warn!(path = %path, ?phase, "handler left a reply open without a write continuation");
                request.end_request();
            }
        }
    }

    fn on_write(&self, exchange: &mut Exchange, request: &mut RequestHandle) {
        request.on_writable(exchange);
    }

    fn on_error(&self, exchange: &Exchange, flags: ErrorFlags, request: &mut RequestHandle) {
        error!("Error connection: {}, code: {} (0x{:X})", exchange.short_description(), flags, flags.bits());
        request.mark_errored();
    }

    fn on_finish(&self, exchange: &mut Exchange, request: RequestHandle) {
        debug!(request = %exchange.short_description(), phase = ?request.phase(), status = ?exchange.response_status(), "request finished");
        request.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuation::{StreamingReply, WriteContinuation, WriteEvent, WriteStatus, write_continuation_fn};
    use crate::handler::handler_fn;
    use micro_http::connection::HttpConnection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    struct CountingTeardown<C> {
        inner: C,
        teardowns: Arc<AtomicUsize>,
    }

    impl<C: WriteContinuation> WriteContinuation for CountingTeardown<C> {
        fn on_write(&mut self, event: WriteEvent<'_, '_>) -> WriteStatus {
            if matches!(event, WriteEvent::Teardown) {
                self.teardowns.fetch_add(1, Ordering::SeqCst);
                return WriteStatus::Stop;
            }
            self.inner.on_write(event)
        }
    }

    fn dispatcher(hello_calls: &Arc<AtomicUsize>, teardowns: &Arc<AtomicUsize>) -> Dispatcher {
        let mut dispatcher = Dispatcher::new();

        let calls = Arc::clone(hello_calls);
        let hello_teardowns = Arc::clone(teardowns);
        dispatcher.register(
            "/hello",
            handler_fn(move |request| {
                calls.fetch_add(1, Ordering::SeqCst);
                let chunks = vec![Bytes::from_static(b"Hello"), Bytes::from_static(b", "), Bytes::from_static(b"World")];
                request.set_write_continuation(CountingTeardown {
                    inner: StreamingReply::new(StatusCode::OK, chunks),
                    teardowns: Arc::clone(&hello_teardowns),
                });
            }),
        );
        dispatcher.register(
            "/world",
            handler_fn(|request| {
                request.add_header("Content-Type", "application/x-json");
                request.reply("World\n", StatusCode::MULTIPLE_CHOICES);
            }),
        );
        let large_teardowns = Arc::clone(teardowns);
        dispatcher.register(
            "/large",
            handler_fn(move |request| {
                let chunks = vec![Bytes::from(vec![b'C'; 1024]); 100];
                request.set_write_continuation(CountingTeardown {
                    inner: StreamingReply::new(StatusCode::OK, chunks),
                    teardowns: Arc::clone(&large_teardowns),
                });
            }),
        );
        let end_teardowns = Arc::clone(teardowns);
        dispatcher.register(
            "/end",
            handler_fn(move |request| {
                let inner = write_continuation_fn(|event| {
                    if let WriteEvent::Writable(request) = event {
                        request.start_chunked_reply(StatusCode::OK);
                        request.send_chunk("abc");
                        request.end_request();
                    }
                    WriteStatus::Continue
                });
                request.set_write_continuation(CountingTeardown { inner, teardowns: Arc::clone(&end_teardowns) });
            }),
        );
        let stop_teardowns = Arc::clone(teardowns);
        dispatcher.register(
            "/stop",
            handler_fn(move |request| {
                request.start_chunked_reply(StatusCode::OK);
                let inner = write_continuation_fn(|event| {
                    if let WriteEvent::Writable(request) = event {
                        request.send_chunk("abc");
                    }
                    WriteStatus::Stop
                });
                request.set_write_continuation(CountingTeardown { inner, teardowns: Arc::clone(&stop_teardowns) });
            }),
        );
        dispatcher.register("/silent", handler_fn(|_request| {}));
        dispatcher
    }

    async fn serve(hooks: &DispatchHooks, request: &str) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer);

        let client_side = async {
            client.write_all(request.as_bytes()).await.unwrap();
            client.shutdown().await.unwrap();
            let mut response = Vec::new();
            client.read_to_end(&mut response).await.unwrap();
            String::from_utf8(response).unwrap()
        };

        let (result, response) = tokio::join!(connection.process(hooks), client_side);
        assert!(result.is_ok());
        response
    }

    #[tokio::test]
    async fn routes_registered_paths_and_answers_misses() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let response = serve(&hooks, "GET /world HTTP/1.1\r\nHost: localhost\r\n\r\nGET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 300 Multiple Choices\r\n"));
        assert!(response.contains("content-type: application/x-json\r\n"));
        assert!(response.contains("\r\n\r\nWorld\nHTTP/1.1 404 Not Found\r\n"));
        assert_eq!(hello_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn streams_with_continuation_and_tears_down_once() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let response = serve(&hooks, "GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("transfer-encoding: chunked\r\n"));
        assert!(response.ends_with("\r\n\r\n5\r\nHello\r\n2\r\n, \r\n5\r\nWorld\r\n0\r\n\r\n"));
        assert_eq!(hello_calls.load(Ordering::SeqCst), 1);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn peer_gone_mid_stream_still_tears_down_once() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let (mut client, server) = duplex(256);
        let (reader, writer) = tokio::io::split(server);
        let connection = HttpConnection::new(reader, writer);

        let client_side = async move {
            client.write_all(b"GET /large HTTP/1.1\r\n\r\n").await.unwrap();
            let mut head = [0u8; 64];
            client.read_exact(&mut head).await.unwrap();
            drop(client);
            head
        };

        let (result, head) = tokio::join!(connection.process(&hooks), client_side);
        assert!(result.is_ok());
        assert!(head.starts_with(b"HTTP/1.1 200 OK\r\n"));
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn end_request_closes_half_sent_reply_and_tears_down_once() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let response = serve(&hooks, "GET /end HTTP/1.1\r\n\r\nGET /world HTTP/1.1\r\n\r\n").await;

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\n3\r\nabc\r\n"));
        assert!(!response.contains("World"));
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_while_streaming_closes_and_tears_down_once() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let response = serve(&hooks, "GET /stop HTTP/1.1\r\n\r\nGET /world HTTP/1.1\r\n\r\n").await;

        assert!(response.ends_with("\r\n\r\n3\r\nabc\r\n"));
        assert!(!response.contains("0\r\n\r\n"));
        assert!(!response.contains("World"));
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unanswered_handler_gets_internal_error() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), ServerConfig::default());

        let response = serve(&hooks, "GET /silent HTTP/1.1\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let hello_calls = Arc::new(AtomicUsize::new(0));
        let teardowns = Arc::new(AtomicUsize::new(0));
        let config = ServerConfig::default().with_max_body_size(4);
        let hooks = DispatchHooks::new(Arc::new(dispatcher(&hello_calls, &teardowns)), config);

        let response = serve(&hooks, "POST /world HTTP/1.1\r\nContent-Length: 8\r\n\r\n01234567").await;
        assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
    }
}
