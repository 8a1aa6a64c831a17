//! The per-request handle and the view handlers work with.
//!
//! A [`RequestHandle`] is created when the request head is parsed and lives
//! with the exchange until the finish hook consumes it. Handlers and
//! continuations never see it directly; they get an [`HttpRequest`], which
//! borrows the handle together with the exchange's [`Transport`].

use std::fmt::Write as _;

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use tracing::{debug, warn};

use crate::continuation::{WriteContinuation, WriteEvent, WriteStatus};
use crate::transport::Transport;

/// Number of body bytes shown by [`HttpRequest::dump_request`]
const DUMP_BODY_LIMIT: usize = 1024;

/// Lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// no response started yet
    Created,
    /// a chunked reply is in progress
    Streaming,
    /// the reply was ended or the request was terminated, waiting for the finish hook
    Completing,
    /// a one-shot reply was queued
    Completed,
    /// the transport failed
    Erroring,
}

impl Phase {
    /// Whether reply and chunk operations are refused.
    #[inline]
    pub fn is_done(self) -> bool {
        matches!(self, Phase::Completing | Phase::Completed | Phase::Erroring)
    }
}

/// State kept for one request between reactor hooks.
pub struct RequestHandle {
    phase: Phase,
    continuation: Option<Box<dyn WriteContinuation>>,
    pending_limit: usize,
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("phase", &self.phase)
            .field("has_continuation", &self.continuation.is_some())
            .field("pending_limit", &self.pending_limit)
            .finish()
    }
}

impl RequestHandle {
    /// `pending_limit` is the backpressure ceiling in bytes of queued output.
    pub fn new(pending_limit: usize) -> Self {
        Self { phase: Phase::Created, continuation: None, pending_limit }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.phase.is_done()
    }

    #[inline]
    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    /// Delivers a writable signal to the registered continuation.
    ///
    /// Nothing happens once the request is done. A continuation replaced
    /// during its own invocation is dropped when the invocation returns.
    pub fn on_writable(&mut self, transport: &mut dyn Transport) {
        if self.is_done() {
            return;
        }
        let Some(mut continuation) = self.continuation.take() else {
            return;
        };

        let status = {
            let mut request = HttpRequest::new(transport, self);
            continuation.on_write(WriteEvent::Writable(&mut request))
        };

        if self.continuation.is_none() {
            self.continuation = Some(continuation);
        } else {
            debug!("write continuation replaced while running");
        }

        if status == WriteStatus::Stop && !self.is_done() {
            debug!(phase = ?self.phase, "write continuation stopped before the reply was complete");
            HttpRequest::new(transport, self).end_request();
        }
    }

    pub fn mark_errored(&mut self) {
        self.phase = Phase::Erroring;
    }

    /// Consumes the handle, giving the continuation its teardown signal.
    pub fn teardown(mut self) {
        if let Some(mut continuation) = self.continuation.take() {
            continuation.on_write(WriteEvent::Teardown);
        }
    }
}

/// A request as seen by handlers and continuations.
pub struct HttpRequest<'a> {
    transport: &'a mut dyn Transport,
    handle: &'a mut RequestHandle,
}

impl std::fmt::Debug for HttpRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("request", &self.transport.short_description())
            .field("handle", &self.handle)
            .finish()
    }
}

impl<'a> HttpRequest<'a> {
    pub fn new(transport: &'a mut dyn Transport, handle: &'a mut RequestHandle) -> Self {
        Self { transport, handle }
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.transport.path()
    }

    /// At most `max_size` bytes of the request body.
    pub fn body(&self, max_size: usize) -> Bytes {
        let body = self.transport.body();
        body.slice(..body.len().min(max_size))
    }

    /// The header value for `key`, `None` when absent or not visible ASCII.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.transport.headers().get(key).and_then(|value| value.to_str().ok())
    }

    pub fn query(&self, key: &str) -> Option<&str> {
        self.transport.query(key)
    }

    /// Adds a response header, returns false if name or value are invalid.
    pub fn add_header(&mut self, key: &str, value: &str) -> bool {
        let (Ok(name), Ok(value)) = (HeaderName::try_from(key), HeaderValue::try_from(value)) else {
            warn!(key, value, "ignore invalid response header");
            return false;
        };
        self.transport.add_header(name, value);
        true
    }

    /// Queues a complete response and marks the request done.
    pub fn reply(&mut self, body: impl Into<Bytes>, status: StatusCode) -> bool {
        if self.transport.is_errored() || self.is_done() || self.handle.phase == Phase::Streaming {
            debug!(phase = ?self.handle.phase, errored = self.transport.is_errored(), "reply refused");
            return false;
        }

        self.handle.phase = Phase::Completed;
        match self.transport.send_reply(status, body.into()) {
            Ok(()) => true,
            Err(e) => {
                warn!(cause = %e, request = %self.transport.short_description(), "failed to send reply");
                false
            }
        }
    }

    pub fn start_chunked_reply(&mut self, status: StatusCode) -> bool {
        if self.transport.is_errored() || self.is_done() || self.handle.phase == Phase::Streaming {
            debug!(phase = ?self.handle.phase, errored = self.transport.is_errored(), "chunked reply refused");
            return false;
        }

        match self.transport.start_chunked_reply(status) {
            Ok(()) => {
                self.handle.phase = Phase::Streaming;
                true
            }
            Err(e) => {
                warn!(cause = %e, request = %self.transport.short_description(), "failed to start chunked reply");
                false
            }
        }
    }

    /// Queues one chunk. Empty chunks are skipped.
    pub fn send_chunk(&mut self, chunk: impl Into<Bytes>) -> bool {
        if self.transport.is_errored() || self.handle.phase != Phase::Streaming {
            return false;
        }

        let chunk = chunk.into();
        if chunk.is_empty() {
            return true;
        }

        match self.transport.send_chunk(chunk) {
            Ok(()) => true,
            Err(e) => {
                warn!(cause = %e, "failed to send chunk");
                false
            }
        }
    }

    pub fn end_chunk_reply(&mut self) -> bool {
        if self.transport.is_errored() || self.handle.phase != Phase::Streaming {
            return false;
        }

        self.handle.phase = Phase::Completing;
        match self.transport.end_chunked_reply() {
            Ok(()) => true,
            Err(e) => {
                warn!(cause = %e, "failed to end chunked reply");
                false
            }
        }
    }

    /// Bytes queued on the connection but not yet written.
    #[inline]
    pub fn pending_data_size(&self) -> usize {
        self.transport.pending_len()
    }

    #[inline]
    pub fn pending_limit(&self) -> usize {
        self.handle.pending_limit
    }

    /// Whether pending output exceeds the limit.
    #[inline]
    pub fn is_write_blocked(&self) -> bool {
        self.pending_data_size() > self.pending_limit()
    }

    /// Registers the continuation invoked on every writable signal, dropping the previous one.
    pub fn set_write_continuation(&mut self, continuation: impl WriteContinuation + 'static) {
        self.handle.continuation = Some(Box::new(continuation));
    }

    pub fn has_write_continuation(&self) -> bool {
        self.handle.has_continuation()
    }

    /// Terminates the request; queued bytes are still flushed, then the exchange finishes.
    pub fn end_request(&mut self) {
        if self.handle.phase != Phase::Erroring {
            self.handle.phase = Phase::Completing;
        }
        self.transport.finish();
    }

    pub fn dump_request(&self, need_body: bool) -> String {
        let mut buf = String::with_capacity(256);
        let _ = writeln!(buf, "Path: {}", self.transport.path());

        if self.transport.raw_query().is_some() {
            buf.push_str("Query: \n");
            for (key, value) in self.transport.queries() {
                let _ = writeln!(buf, "    '{key}: {value}'");
            }
        }

        buf.push_str("Headers: \n");
        for (name, value) in self.transport.headers() {
            let _ = writeln!(buf, "    '{}: {}'", name, String::from_utf8_lossy(value.as_bytes()));
        }

        if need_body {
            buf.push_str("\n-- START BODY --\n");
            buf.push_str(&String::from_utf8_lossy(&self.body(DUMP_BODY_LIMIT)));
            buf.push_str("\n-- END BODY --\n");
        }
        buf
    }

    pub fn short_description(&self) -> String {
        self.transport.short_description()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.handle.phase
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }
}
