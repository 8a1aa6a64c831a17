//! Body framing for request and response payloads.
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: chunked transfer encoded request bodies
//! - [`LengthDecoder`]: `Content-Length` request bodies
//! - [`PayloadDecoder`]: selects one of the above from the [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! ## Encoders
//! - [`ChunkedEncoder`]: chunked transfer encoding
//! - [`LengthEncoder`]: fixed length bodies
//! - [`PayloadEncoder`]: selects one of the above, or no body at all

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
