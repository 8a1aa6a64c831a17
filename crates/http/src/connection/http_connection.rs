use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio::time::{Instant, sleep, timeout};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::RequestDecoder;
use crate::connection::message_writer::MessageWriter;
use crate::connection::{ConnectionSettings, Exchange};
use crate::hook::{ConnectionHooks, ErrorFlags, HookStatus};
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Idle backoff while a paused producer has nothing queued
const PAUSE_BACKOFF: Duration = Duration::from_millis(1);

enum Inbound {
    Message(Message<(RequestHeader, PayloadSize)>),
    Failed(ParseError),
    Closed,
    TimedOut,
    Shutdown,
}

enum BodyError {
    TooLong,
    Transport(ErrorFlags),
    Malformed(ParseError),
}

/// An HTTP/1.1 connection driving each exchange through [`ConnectionHooks`].
///
/// Requests are served one at a time. For each of them the connection reads the
/// head and the complete body, lets the hooks produce a response and then keeps
/// calling [`ConnectionHooks::on_write`] while the response is incomplete,
/// writing queued output as the transport accepts it.
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    writer: MessageWriter<W>,
    settings: ConnectionSettings,
    peer_addr: Option<SocketAddr>,
    shutdown: Option<CancellationToken>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            writer: MessageWriter::new(writer),
            settings: ConnectionSettings::default(),
            peer_addr: None,
            shutdown: None,
        }
    }

    pub fn with_settings(mut self, settings: ConnectionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_peer_addr(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    /// Stops reading new requests once `token` is cancelled.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    pub async fn process<H>(mut self, hooks: &H) -> Result<(), HttpError>
    where
        H: ConnectionHooks,
    {
        if hooks.on_post_accept(&mut self.settings) == HookStatus::Reject {
            info!(peer = ?self.peer_addr, "connection rejected after accept");
            return Ok(());
        }

        let mut served = 0usize;
        loop {
            match self.next_inbound().await {
                Inbound::Message(Message::Header((header, payload_size))) => {
                    served += 1;
                    let keep_alive = self.do_process(header, payload_size, hooks).await?;
                    let limit_reached = self.settings.max_keepalive_requests.is_some_and(|max| served >= max);
                    if !keep_alive || limit_reached {
                        debug!(served, "close connection after response");
                        return Ok(());
                    }
                }

                Inbound::Message(Message::Payload(_)) => {
                    error!("receive body while expecting request head");
                    let _ = self.writer.write_status(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Inbound::Failed(e) => {
                    error!("can't receive next request, cause {}", e);
                    let _ = self.writer.write_status(StatusCode::BAD_REQUEST).await;
                    return Err(e.into());
                }

                Inbound::Closed => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }

                Inbound::TimedOut => {
                    info!(timeout = ?self.settings.read_timeout, "connection idle too long, close it");
                    return Ok(());
                }

                Inbound::Shutdown => {
                    info!("server shutting down, close idle connection");
                    return Ok(());
                }
            }
        }
    }

    async fn next_inbound(&mut self) -> Inbound {
        let shutdown = self.shutdown.clone();
        let read = timeout(self.settings.read_timeout, self.framed_read.next());

        let result = match shutdown {
            Some(token) => select! {
                _ = token.cancelled() => return Inbound::Shutdown,
                result = read => result,
            },
            None => read.await,
        };

        match result {
            Ok(Some(Ok(message))) => Inbound::Message(message),
            Ok(Some(Err(e))) => Inbound::Failed(e),
            Ok(None) => Inbound::Closed,
            Err(_) => Inbound::TimedOut,
        }
    }

    /// Serves one exchange, returning whether the connection may be reused.
    async fn do_process<H>(&mut self, header: RequestHeader, payload_size: PayloadSize, hooks: &H) -> Result<bool, HttpError>
    where
        H: ConnectionHooks,
    {
        let keep_alive = header.keep_alive();
        let body_too_long = match (payload_size, self.settings.max_body_size) {
            (PayloadSize::Length(length), Some(max)) => length > max,
            _ => false,
        };

        // an oversized body is refused before the client is invited to send it
        if header.expect_continue() && !payload_size.is_empty() && !body_too_long {
            self.writer.write_raw(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
            info!("receive expect request header, sent continue response");
        }

        let mut exchange = Exchange::new(header).with_peer_addr(self.peer_addr);
        let mut state = hooks.on_headers(&mut exchange);

        if !payload_size.is_empty() {
            match self.read_body(payload_size).await {
                Ok(body) => exchange.set_body(body),
                Err(e) => {
                    let (flags, status) = match e {
                        BodyError::TooLong => (ErrorFlags::DATA_TOO_LONG, Some(StatusCode::PAYLOAD_TOO_LARGE)),
                        BodyError::Malformed(e) => {
                            warn!(cause = %e, "malformed request body");
                            (ErrorFlags::READING | ErrorFlags::ERROR, Some(StatusCode::BAD_REQUEST))
                        }
                        BodyError::Transport(flags) => (flags, None),
                    };

                    exchange.fail(flags);
                    if let Some(state) = state.as_mut() {
                        hooks.on_error(&exchange, flags, state);
                    }
                    if let Some(status) = status {
                        let _ = self.writer.write_status(status).await;
                    }
                    if let Some(state) = state {
                        hooks.on_finish(&mut exchange, state);
                    }
                    return Ok(false);
                }
            }
        }

        hooks.on_request(&mut exchange, state.as_mut());
        self.drive(&mut exchange, state.as_mut(), hooks).await;

        if let Some(state) = state {
            hooks.on_finish(&mut exchange, state);
        }

        Ok(keep_alive
            && exchange.is_complete()
            && !exchange.is_close_delimited()
            && !exchange.is_errored()
            && !self.framed_read.decoder().is_decoding_payload())
    }

    async fn read_body(&mut self, payload_size: PayloadSize) -> Result<Bytes, BodyError> {
        let max_body_size = self.settings.max_body_size;
        if let (PayloadSize::Length(length), Some(max)) = (payload_size, max_body_size) {
            if length > max {
                return Err(BodyError::TooLong);
            }
        }

        let mut body = BytesMut::new();
        loop {
            let item = match timeout(self.settings.read_timeout, self.framed_read.next()).await {
                Err(_) => return Err(BodyError::Transport(ErrorFlags::READING | ErrorFlags::TIMEOUT)),
                Ok(None) => return Err(BodyError::Transport(ErrorFlags::READING | ErrorFlags::EOF)),
                Ok(Some(Err(ParseError::Io { source }))) => {
                    debug!(cause = %source, "read request body failed");
                    return Err(BodyError::Transport(ErrorFlags::READING | ErrorFlags::ERROR));
                }
                Ok(Some(Err(e))) => return Err(BodyError::Malformed(e)),
                Ok(Some(Ok(Message::Header(_)))) => {
                    return Err(BodyError::Malformed(ParseError::invalid_body("receive request head while reading body")));
                }
                Ok(Some(Ok(Message::Payload(item)))) => item,
            };

            match item {
                PayloadItem::Chunk(bytes) => {
                    if max_body_size.is_some_and(|max| (body.len() + bytes.len()) as u64 > max) {
                        return Err(BodyError::TooLong);
                    }
                    body.extend_from_slice(&bytes);
                }
                PayloadItem::Eof => return Ok(body.freeze()),
            }
        }
    }

    /// Flushes exchange output and asks the hooks for more until the response is
    /// complete, the exchange is finished or the transport fails.
    async fn drive<H>(&mut self, exchange: &mut Exchange, mut state: Option<&mut H::Request>, hooks: &H)
    where
        H: ConnectionHooks,
    {
        let write_timeout = self.settings.write_timeout;
        let mut last_progress = Instant::now();

        loop {
            if exchange.pending_len() > 0 {
                match self.writer.write_some(exchange.out_mut(), write_timeout).await {
                    Ok(_) => last_progress = Instant::now(),
                    Err(flags) => {
                        debug!(%flags, pending = exchange.pending_len(), "write response failed");
                        exchange.fail(flags);
                        if let Some(state) = state.as_deref_mut() {
                            hooks.on_error(exchange, flags, state);
                        }
                        return;
                    }
                }
            }

            let producing = !exchange.is_complete() && !exchange.is_finished();
            let Some(request) = state.as_deref_mut().filter(|_| producing) else {
                if exchange.pending_len() == 0 {
                    return;
                }
                continue;
            };

            hooks.on_write(exchange, request);

            if exchange.pending_len() == 0 && !exchange.is_complete() && !exchange.is_finished() {
                if last_progress.elapsed() > write_timeout {
                    let flags = ErrorFlags::WRITING | ErrorFlags::TIMEOUT;
                    warn!(%flags, "response stalled without output");
                    exchange.fail(flags);
                    hooks.on_error(exchange, flags, request);
                    return;
                }
                sleep(PAUSE_BACKOFF).await;
            }
        }
    }
}
