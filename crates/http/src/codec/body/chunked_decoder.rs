//! Decoder for chunked transfer encoded request bodies (RFC 9112 section 7.1).
//!
//! Chunk size lines, including extensions, are parsed with
//! [`httparse::parse_chunk_size`]. Trailer fields are consumed and discarded.

use std::cmp;

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Upper bound for a single trailer line
const MAX_TRAILER_LINE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data(u64),
    DataEnd,
    Trailer,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::Size => match httparse::parse_chunk_size(&src[..]) {
                    Ok(Status::Complete((offset, 0))) => {
                        src.advance(offset);
                        self.state = State::Trailer;
                    }
                    Ok(Status::Complete((offset, size))) => {
                        src.advance(offset);
                        self.state = State::Data(size);
                    }
                    Ok(Status::Partial) => return Ok(None),
                    Err(_) => return Err(ParseError::invalid_body("invalid chunk size line")),
                },

                State::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }
                    let len = cmp::min(remaining, src.len() as u64);
                    let bytes = src.split_to(len as usize).freeze();
                    let remaining = remaining - len;
                    self.state = if remaining == 0 { State::DataEnd } else { State::Data(remaining) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                State::DataEnd => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(&src[..2] == b"\r\n", ParseError::invalid_body("missing CRLF after chunk data"));
                    src.advance(2);
                    self.state = State::Size;
                }

                State::Trailer => {
                    let Some(line_end) = src.windows(2).position(|w| w == b"\r\n") else {
                        ensure!(src.len() <= MAX_TRAILER_LINE, ParseError::invalid_body("trailer line too long"));
                        return Ok(None);
                    };
                    src.advance(line_end + 2);
                    if line_end == 0 {
                        self.state = State::Done;
                        return Ok(Some(PayloadItem::Eof));
                    }
                }

                State::Done => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }
}
