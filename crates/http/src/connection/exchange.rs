use std::fmt::Write as _;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Version};
use tokio_util::codec::Encoder;
use tracing::warn;

use crate::codec::ResponseEncoder;
use crate::hook::ErrorFlags;
use crate::protocol::{Message, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError, response_head};

type OutMessage = Message<(ResponseHead, PayloadSize), Bytes>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    Idle,
    Chunked,
    Complete,
}

/// One request/response pair on a connection.
///
/// Handlers read the request through it and queue response bytes into its
/// output buffer. The connection drains that buffer to the socket, so
/// [`pending_len`](Exchange::pending_len) is the amount of output not yet accepted
/// by the transport.
#[derive(Debug)]
pub struct Exchange {
    header: RequestHeader,
    query: Vec<(String, String)>,
    body: Bytes,
    peer_addr: Option<SocketAddr>,

    headers_out: HeaderMap,
    encoder: ResponseEncoder,
    out: BytesMut,
    reply: ReplyState,
    status: Option<StatusCode>,
    close_delimited: bool,

    error: Option<ErrorFlags>,
    finished: bool,
}

impl Exchange {
    pub fn new(header: RequestHeader) -> Self {
        let query = match header.query() {
            Some(raw) => serde_urlencoded::from_str::<Vec<(String, String)>>(raw).unwrap_or_else(|e| {
                warn!(query = raw, cause = %e, "ignore malformed query string");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            header,
            query,
            body: Bytes::new(),
            peer_addr: None,
            headers_out: HeaderMap::new(),
            encoder: ResponseEncoder::new(),
            out: BytesMut::new(),
            reply: ReplyState::Idle,
            status: None,
            close_delimited: false,
            error: None,
            finished: false,
        }
    }

    pub fn with_peer_addr(mut self, peer_addr: Option<SocketAddr>) -> Self {
        self.peer_addr = peer_addr;
        self
    }

    #[inline]
    pub fn request_header(&self) -> &RequestHeader {
        &self.header
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.header.path()
    }

    #[inline]
    pub fn raw_query(&self) -> Option<&str> {
        self.header.query()
    }

    /// First value of the query parameter `key`, percent-decoded.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn queries(&self) -> &[(String, String)] {
        &self.query
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub(crate) fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    #[inline]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Adds an output header, sent with the next response head.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers_out.append(name, value);
    }

    /// Queues a complete response with a `Content-Length` body.
    pub fn send_reply(&mut self, status: StatusCode, body: Bytes) -> Result<(), SendError> {
        self.check_writable(ReplyState::Idle)?;

        let head = response_head(status, std::mem::take(&mut self.headers_out));
        self.encode(Message::Header((head, PayloadSize::new_length(body.len() as u64))))?;
        if !body.is_empty() {
            self.encode(Message::Payload(PayloadItem::Chunk(body)))?;
        }

        self.status = Some(status);
        self.reply = ReplyState::Complete;
        Ok(())
    }

    /// Queues a chunked response head, chunks follow with [`send_reply_chunk`](Exchange::send_reply_chunk).
    ///
    /// HTTP/1.0 peers get the chunks unframed, ended by closing the connection.
    pub fn send_reply_chunk_start(&mut self, status: StatusCode) -> Result<(), SendError> {
        self.check_writable(ReplyState::Idle)?;

        let head = response_head(status, std::mem::take(&mut self.headers_out));
        let close_delimited = self.header.version() == Version::HTTP_10;
        let payload_size = if close_delimited { PayloadSize::UntilClose } else { PayloadSize::Chunked };
        self.encode(Message::Header((head, payload_size)))?;
        self.close_delimited = close_delimited;

        self.status = Some(status);
        self.reply = ReplyState::Chunked;
        Ok(())
    }

    /// Queues one chunk, empty chunks are ignored.
    pub fn send_reply_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        self.check_writable(ReplyState::Chunked)?;
        self.encode(Message::Payload(PayloadItem::Chunk(chunk)))
    }

    /// Queues the terminating chunk.
    pub fn send_reply_chunk_end(&mut self) -> Result<(), SendError> {
        self.check_writable(ReplyState::Chunked)?;
        self.encode(Message::Payload(PayloadItem::Eof))?;
        self.reply = ReplyState::Complete;
        Ok(())
    }

    /// Bytes queued but not yet written to the transport.
    #[inline]
    pub fn pending_len(&self) -> usize {
        self.out.len()
    }

    /// Stops output production. Queued bytes are still flushed; an incomplete
    /// response closes the connection afterwards.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether a full response has been queued.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.reply == ReplyState::Complete
    }

    /// Whether the response body is ended by closing the connection.
    #[inline]
    pub fn is_close_delimited(&self) -> bool {
        self.close_delimited
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        self.reply == ReplyState::Chunked
    }

    #[inline]
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }

    #[inline]
    pub fn error_flags(&self) -> Option<ErrorFlags> {
        self.error
    }

    #[inline]
    pub fn response_status(&self) -> Option<StatusCode> {
        self.status
    }

    /// `path?query\tpeer`, used for one-line request logging.
    pub fn short_description(&self) -> String {
        let mut description = String::with_capacity(64);
        description.push_str(self.path());
        if let Some(query) = self.raw_query() {
            description.push('?');
            description.push_str(query);
        }
        description.push('\t');
        match self.peer_addr {
            Some(addr) => {
                let _ = write!(description, "{addr}");
            }
            None => description.push('-'),
        }
        description
    }

    pub(crate) fn fail(&mut self, flags: ErrorFlags) {
        if self.error.is_none() {
            self.error = Some(flags);
        }
    }

    pub(crate) fn out_mut(&mut self) -> &mut BytesMut {
        &mut self.out
    }

    fn check_writable(&self, expected: ReplyState) -> Result<(), SendError> {
        if let Some(flags) = self.error {
            return Err(SendError::errored(flags));
        }
        if self.reply != expected {
            return Err(SendError::invalid_state(format!("expect reply state {expected:?} but is {:?}", self.reply)));
        }
        Ok(())
    }

    #[inline]
    fn encode(&mut self, message: OutMessage) -> Result<(), SendError> {
        self.encoder.encode(message, &mut self.out)
    }
}
