//! Request head decoding and response head encoding.
//!
//! - [`HeaderDecoder`]: parses the request line and headers, enforcing the size limits
//! - [`HeaderEncoder`]: writes the status line and headers, setting the framing header

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
