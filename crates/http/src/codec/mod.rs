//! HTTP codec module for encoding and decoding HTTP messages
//!
//! - Request handling: [`RequestDecoder`] parses the request head with the
//!   [`header`] decoder, then frames the body with the [`body`] decoders
//! - Response handling: [`ResponseEncoder`] writes the status line and headers,
//!   then frames the body as fixed length or chunked
//!
//! # Example
//!
//! ```
//! use bytes::{Bytes, BytesMut};
//! use http::{HeaderMap, StatusCode};
//! use micro_http::codec::{RequestDecoder, ResponseEncoder};
//! use micro_http::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, response_head};
//! use tokio_util::codec::{Decoder, Encoder};
//!
//! let mut decoder = RequestDecoder::new();
//! let mut request_buffer = BytesMut::from("GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n");
//! let message = decoder.decode(&mut request_buffer).unwrap().unwrap();
//! assert!(message.is_header());
//!
//! let mut encoder = ResponseEncoder::new();
//! let mut response_buffer = BytesMut::new();
//! let head = response_head(StatusCode::OK, HeaderMap::new());
//! let header: Message<(ResponseHead, PayloadSize)> = Message::Header((head, PayloadSize::Length(5)));
//! let payload: Message<(ResponseHead, PayloadSize)> = Message::Payload(PayloadItem::Chunk(Bytes::from_static(b"hello")));
//! encoder.encode(header, &mut response_buffer).unwrap();
//! encoder.encode(payload, &mut response_buffer).unwrap();
//! assert!(response_buffer.ends_with(b"\r\n\r\nhello"));
//! ```

mod body;
mod header;
mod request_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use response_encoder::ResponseEncoder;
