//! HTTP header encoder implementation for serializing HTTP response headers
//!
//! The status line is followed by the response headers, with `Content-Length`
//! or `Transfer-Encoding` set from the payload size so the framing on the wire
//! always matches the body that follows.

use crate::protocol::{PayloadSize, ResponseHead, SendError};

use bytes::{BufMut, BytesMut};

use http::{HeaderValue, Version, header};
use std::io;
use std::io::Write;
use tracing::error;
use tokio_util::codec::Encoder;

/// Initial buffer size reserved for header serialization
const INIT_HEADER_SIZE: usize = 1024;

const CHUNKED_VALUE: HeaderValue = HeaderValue::from_static("chunked");
const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");
const CLOSE_VALUE: HeaderValue = HeaderValue::from_static("close");

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Only HTTP/1.1 responses are written, other versions are rejected.
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        if head.version() != Version::HTTP_11 {
            error!(http_version = ?head.version(), "unsupported http version");
            return Err(SendError::invalid_state(format!("unsupported http version {:?}", head.version())));
        }

        dst.reserve(INIT_HEADER_SIZE);
        let status = head.status();
        write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))?;

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED_VALUE);
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
            }
            PayloadSize::UntilClose => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::CONNECTION, CLOSE_VALUE);
            }
        }

        for (header_name, header_value) in head.headers().iter() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// `io::Write` over a `BytesMut` for the status line formatting.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::response_head;
    use http::{HeaderMap, StatusCode};

    fn encode(status: StatusCode, headers: HeaderMap, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((response_head(status, headers), payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn writes_status_line_and_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let text = encode(StatusCode::MULTIPLE_CHOICES, headers, PayloadSize::Length(6));
        assert!(text.starts_with("HTTP/1.1 300 Multiple Choices\r\n"));
        assert!(text.contains("content-type: text/plain\r\n"));
        assert!(text.contains("content-length: 6\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn chunked_replaces_content_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));

        let text = encode(StatusCode::OK, headers, PayloadSize::Chunked);
        assert!(text.contains("transfer-encoding: chunked\r\n"));
        assert!(!text.contains("content-length"));
    }

    #[test]
    fn until_close_drops_framing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));

        let text = encode(StatusCode::OK, headers, PayloadSize::UntilClose);
        assert!(text.contains("connection: close\r\n"));
        assert!(!text.contains("content-length"));
        assert!(!text.contains("transfer-encoding"));
    }

    #[test]
    fn unknown_status_has_empty_reason() {
        let text = encode(StatusCode::from_u16(599).unwrap(), HeaderMap::new(), PayloadSize::Empty);
        assert!(text.starts_with("HTTP/1.1 599 \r\n"));
    }
}
