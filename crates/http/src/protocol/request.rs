//! HTTP request header handling implementation.
//!
//! This module wraps the standard `http::Request<()>` with the few request
//! inspections the reactor needs while driving an exchange: the routing path,
//! the raw query, body expectations and keep-alive intent.

use http::header::{CONNECTION, EXPECT};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// The normalized path used as routing command, empty when the uri carries none.
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// The raw query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.inner.uri().query()
    }

    /// Determines if this request requires a body based on its HTTP method.
    ///
    /// Returns false for GET, HEAD, DELETE, OPTIONS and CONNECT.
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Whether the client sent `Expect: 100-continue`.
    pub fn expect_continue(&self) -> bool {
        self.headers().get(EXPECT).is_some_and(|value| value.as_bytes().len() >= 4 && &value.as_bytes()[0..4] == b"100-")
    }

    /// Whether the connection may be reused after this exchange.
    ///
    /// HTTP/1.1 defaults to keep-alive unless `Connection: close` is present,
    /// HTTP/1.0 only keeps the connection when the client asks for it.
    pub fn keep_alive(&self) -> bool {
        let connection = self.headers().get(CONNECTION).map(|value| value.as_bytes());
        match self.version() {
            Version::HTTP_11 => !connection.is_some_and(|value| value.eq_ignore_ascii_case(b"close")),
            _ => connection.is_some_and(|value| value.eq_ignore_ascii_case(b"keep-alive")),
        }
    }
}

/// Converts request parts into a RequestHeader.
impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Self { inner: Request::from_parts(parts, ()) }
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(builder: http::request::Builder) -> RequestHeader {
        builder.body(()).unwrap().into()
    }

    #[test]
    fn path_and_query() {
        let header = header(Request::builder().uri("/index/?a=1&b=2&a=3"));
        assert_eq!(header.path(), "/index/");
        assert_eq!(header.query(), Some("a=1&b=2&a=3"));
    }

    #[test]
    fn keep_alive_defaults() {
        assert!(header(Request::builder().version(Version::HTTP_11)).keep_alive());
        assert!(!header(Request::builder().version(Version::HTTP_11).header(CONNECTION, "Close")).keep_alive());
        assert!(!header(Request::builder().version(Version::HTTP_10)).keep_alive());
        assert!(header(Request::builder().version(Version::HTTP_10).header(CONNECTION, "keep-alive")).keep_alive());
    }

    #[test]
    fn expect_continue() {
        assert!(header(Request::builder().header(EXPECT, "100-continue")).expect_continue());
        assert!(!header(Request::builder()).expect_continue());
    }

    #[test]
    fn body_expectation_by_method() {
        assert!(!header(Request::builder().method(Method::GET)).need_body());
        assert!(header(Request::builder().method(Method::POST)).need_body());
    }
}
