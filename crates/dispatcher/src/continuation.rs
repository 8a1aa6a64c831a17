//! Write continuations, the producers of streamed responses.
//!
//! A continuation is registered on a request with
//! [`HttpRequest::set_write_continuation`] and is invoked with
//! [`WriteEvent::Writable`] every time the connection can take more output.
//! Its [`WriteStatus`] decides whether it is invoked again. When the exchange
//! finishes, for whatever reason, it receives [`WriteEvent::Teardown`] exactly once.

use std::fmt;

use bytes::Bytes;
use http::StatusCode;

use crate::request::{HttpRequest, Phase};

/// What a continuation is invoked for.
pub enum WriteEvent<'r, 'a> {
    /// the connection accepts more output
    Writable(&'r mut HttpRequest<'a>),
    /// the exchange is finishing, release resources, nothing can be written
    Teardown,
}

impl fmt::Debug for WriteEvent<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteEvent::Writable(request) => f.debug_tuple("Writable").field(&request.short_description()).finish(),
            WriteEvent::Teardown => f.write_str("Teardown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// output was produced, invoke again on the next writable signal
    Continue,
    /// too much output is pending, invoke again on the next writable signal
    Pause,
    /// no more invocations; ends the request if the reply is not complete
    Stop,
}

pub trait WriteContinuation {
    fn on_write(&mut self, event: WriteEvent<'_, '_>) -> WriteStatus;
}

/// A continuation backed by a closure, see [`write_continuation_fn`].
pub struct FnContinuation<F> {
    f: F,
}

impl<F> fmt::Debug for FnContinuation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnContinuation").finish_non_exhaustive()
    }
}

impl<F> WriteContinuation for FnContinuation<F>
where
    F: FnMut(WriteEvent<'_, '_>) -> WriteStatus,
{
    fn on_write(&mut self, event: WriteEvent<'_, '_>) -> WriteStatus {
        (self.f)(event)
    }
}

pub fn write_continuation_fn<F>(f: F) -> FnContinuation<F>
where
    F: FnMut(WriteEvent<'_, '_>) -> WriteStatus,
{
    FnContinuation { f }
}

/// Streams every chunk of an iterator as a chunked reply with `status`.
///
/// The reply is started on the first writable signal. A chunk is only
/// queued while the pending output is within the request's limit, so at most
/// one chunk is buffered beyond it.
pub struct StreamingReply<I> {
    status: StatusCode,
    chunks: I,
    started: bool,
}

impl<I> StreamingReply<I>
where
    I: Iterator<Item = Bytes>,
{
    pub fn new(status: StatusCode, chunks: impl IntoIterator<IntoIter = I>) -> Self {
        Self { status, chunks: chunks.into_iter(), started: false }
    }
}

impl<I> fmt::Debug for StreamingReply<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingReply").field("status", &self.status).field("started", &self.started).finish_non_exhaustive()
    }
}

impl<I> WriteContinuation for StreamingReply<I>
where
    I: Iterator<Item = Bytes>,
{
    fn on_write(&mut self, event: WriteEvent<'_, '_>) -> WriteStatus {
        let WriteEvent::Writable(request) = event else {
            return WriteStatus::Stop;
        };

        if !self.started {
            // the handler may have started the reply before registering
            if request.phase() != Phase::Streaming && !request.start_chunked_reply(self.status) {
                return WriteStatus::Stop;
            }
            self.started = true;
        }

        if request.is_write_blocked() {
            return WriteStatus::Pause;
        }

        match self.chunks.next() {
            Some(chunk) => {
                if request.send_chunk(chunk) {
                    WriteStatus::Continue
                } else {
                    WriteStatus::Stop
                }
            }
            None => {
                request.end_chunk_reply();
                WriteStatus::Stop
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestHandle;
    use crate::transport::testing::{Frame, RecordingTransport};

    #[test]
    fn empty_stream_has_start_and_end_framing() {
        let mut transport = RecordingTransport::new("/empty");
        let mut handle = RequestHandle::new(1024);
        HttpRequest::new(&mut transport, &mut handle)
            .set_write_continuation(StreamingReply::new(StatusCode::OK, Vec::<Bytes>::new()));

        handle.on_writable(&mut transport);

        assert_eq!(transport.frames, vec![Frame::Start(StatusCode::OK), Frame::End]);
        assert_eq!(handle.phase(), Phase::Completing);
        assert!(!transport.finished);
    }

    #[test]
    fn stalled_peer_keeps_stream_paused() {
        let chunk = Bytes::from(vec![b'C'; 100]);
        let mut transport = RecordingTransport::new("/hello");
        let mut handle = RequestHandle::new(250);
        HttpRequest::new(&mut transport, &mut handle)
            .set_write_continuation(StreamingReply::new(StatusCode::OK, std::iter::repeat_n(chunk, 100)));

        for _ in 0..50 {
            handle.on_writable(&mut transport);
            assert!(transport.pending <= 250 + 100);
        }

        assert_eq!(transport.chunks(), 3);
        assert_eq!(handle.phase(), Phase::Streaming);

        transport.drain();
        handle.on_writable(&mut transport);
        assert_eq!(transport.chunks(), 4);
    }

    #[test]
    fn continues_a_reply_started_by_the_handler() {
        let mut transport = RecordingTransport::new("/hello");
        let mut handle = RequestHandle::new(1024);
        {
            let mut request = HttpRequest::new(&mut transport, &mut handle);
            assert!(request.start_chunked_reply(StatusCode::OK));
            request.set_write_continuation(StreamingReply::new(StatusCode::OK, vec![Bytes::from_static(b"hi")]));
        }

        handle.on_writable(&mut transport);
        handle.on_writable(&mut transport);

        assert_eq!(
            transport.frames,
            vec![Frame::Start(StatusCode::OK), Frame::Chunk(Bytes::from_static(b"hi")), Frame::End]
        );
        assert_eq!(handle.phase(), Phase::Completing);
        assert!(!transport.finished);
    }

    #[test]
    fn drains_to_completion() {
        let chunks = ["Wiki", "pedia", "", "!"].map(|chunk: &'static str| Bytes::from_static(chunk.as_bytes()));
        let mut transport = RecordingTransport::new("/hello");
        let mut handle = RequestHandle::new(1024);
        HttpRequest::new(&mut transport, &mut handle).set_write_continuation(StreamingReply::new(StatusCode::OK, chunks));

        while !handle.is_done() {
            handle.on_writable(&mut transport);
            transport.drain();
        }

        assert_eq!(
            transport.frames,
            vec![
                Frame::Start(StatusCode::OK),
                Frame::Chunk(Bytes::from_static(b"Wiki")),
                Frame::Chunk(Bytes::from_static(b"pedia")),
                Frame::Chunk(Bytes::from_static(b"!")),
                Frame::End,
            ]
        );
    }
}
