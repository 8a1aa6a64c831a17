//! The reactor operations a request handle drives.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use micro_http::connection::Exchange;
use micro_http::protocol::SendError;

/// One exchange as seen by the dispatcher.
///
/// Output goes into a buffer owned by the reactor. [`pending_len`](Transport::pending_len)
/// reports how much of it the peer has not accepted yet.
pub trait Transport {
    fn path(&self) -> &str;

    fn raw_query(&self) -> Option<&str>;

    fn query(&self, key: &str) -> Option<&str>;

    fn queries(&self) -> &[(String, String)];

    fn headers(&self) -> &HeaderMap;

    fn body(&self) -> &Bytes;

    fn peer_addr(&self) -> Option<SocketAddr>;

    fn is_errored(&self) -> bool;

    fn add_header(&mut self, name: HeaderName, value: HeaderValue);

    fn send_reply(&mut self, status: StatusCode, body: Bytes) -> Result<(), SendError>;

    fn start_chunked_reply(&mut self, status: StatusCode) -> Result<(), SendError>;

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError>;

    fn end_chunked_reply(&mut self) -> Result<(), SendError>;

    fn pending_len(&self) -> usize;

    /// No more output will be produced for this exchange.
    fn finish(&mut self);

    fn short_description(&self) -> String;
}

impl Transport for Exchange {
    fn path(&self) -> &str {
        Exchange::path(self)
    }

    fn raw_query(&self) -> Option<&str> {
        Exchange::raw_query(self)
    }

    fn query(&self, key: &str) -> Option<&str> {
        Exchange::query(self, key)
    }

    fn queries(&self) -> &[(String, String)] {
        Exchange::queries(self)
    }

    fn headers(&self) -> &HeaderMap {
        Exchange::headers(self)
    }

    fn body(&self) -> &Bytes {
        Exchange::body(self)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Exchange::peer_addr(self)
    }

    fn is_errored(&self) -> bool {
        Exchange::is_errored(self)
    }

    fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        Exchange::add_header(self, name, value);
    }

    fn send_reply(&mut self, status: StatusCode, body: Bytes) -> Result<(), SendError> {
        Exchange::send_reply(self, status, body)
    }

    fn start_chunked_reply(&mut self, status: StatusCode) -> Result<(), SendError> {
        self.send_reply_chunk_start(status)
    }

    fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SendError> {
        self.send_reply_chunk(chunk)
    }

    fn end_chunked_reply(&mut self) -> Result<(), SendError> {
        self.send_reply_chunk_end()
    }

    fn pending_len(&self) -> usize {
        Exchange::pending_len(self)
    }

    fn finish(&mut self) {
        Exchange::finish(self);
    }

    fn short_description(&self) -> String {
        Exchange::short_description(self)
    }
}
