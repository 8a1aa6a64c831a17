//! HTTP request decoder module
//!
//! Requests are decoded in two phases. The head is parsed by [`HeaderDecoder`],
//! then, when the head announces a body, [`PayloadDecoder`] yields its chunks
//! followed by a single [`PayloadItem::Eof`].

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};
use bytes::BytesMut;
use tokio_util::codec::Decoder;

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
///
/// Requests without a body never enter the payload phase, so no payload
/// message is produced for them.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: HeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    /// Creates a new `RequestDecoder` instance
    pub fn new() -> Self {
        Default::default()
    }

    /// Whether the decoder is in the middle of a request body.
    pub fn is_decoding_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Chunk(_)) => Some(Message::Payload(item)),
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                None => None,
            };

            return Ok(message);
        }

        let message = match self.header_decoder.decode(src)? {
            Some((header, payload_size)) => {
                if !payload_size.is_empty() {
                    self.payload_decoder = Some(payload_size.into());
                }
                Some(Message::Header((header, payload_size)))
            }
            None => None,
        };

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn bodyless_request_yields_only_header() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");

        let Some(Message::Header((header, _))) = decoder.decode(&mut buf).unwrap() else { panic!("expect header") };
        assert_eq!(header.path(), "/a");
        assert!(!decoder.is_decoding_payload());

        let Some(Message::Header((header, _))) = decoder.decode(&mut buf).unwrap() else { panic!("expect header") };
        assert_eq!(header.path(), "/b");
    }

    #[test]
    fn length_body_then_eof() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST /a HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello");

        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_header());
        let Some(Message::Payload(item)) = decoder.decode(&mut buf).unwrap() else { panic!("expect payload") };
        assert_eq!(item.into_bytes(), Some(Bytes::from_static(b"hello")));
        let Some(Message::Payload(item)) = decoder.decode(&mut buf).unwrap() else { panic!("expect payload") };
        assert!(item.is_eof());
        assert!(!decoder.is_decoding_payload());
    }
}
