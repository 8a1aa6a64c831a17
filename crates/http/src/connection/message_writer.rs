use crate::codec::ResponseEncoder;
use crate::hook::ErrorFlags;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError, response_head};
use bytes::{Bytes, BytesMut};
use http::header::CONNECTION;
use http::{HeaderMap, HeaderValue, StatusCode};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::codec::Encoder;
use tracing::debug;

/// Writes exchange output to the socket, reporting failures as [`ErrorFlags`].
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes as much of `buf` as the socket accepts in one call, advancing it.
    pub async fn write_some(&mut self, buf: &mut BytesMut, write_timeout: Duration) -> Result<usize, ErrorFlags> {
        match timeout(write_timeout, self.writer.write_buf(buf)).await {
            Err(_) => Err(ErrorFlags::WRITING | ErrorFlags::TIMEOUT),
            Ok(Ok(0)) => Err(ErrorFlags::WRITING | ErrorFlags::EOF),
            Ok(Ok(written)) => {
                if buf.is_empty() {
                    self.writer.flush().await.map_err(|e| {
                        debug!(cause = %e, "flush failed");
                        ErrorFlags::WRITING | ErrorFlags::ERROR
                    })?;
                }
                Ok(written)
            }
            Ok(Err(e)) => {
                debug!(cause = %e, "write failed");
                Err(ErrorFlags::WRITING | ErrorFlags::ERROR)
            }
        }
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> Result<(), SendError> {
        self.writer.write_all(bytes).await?;
        Ok(self.writer.flush().await?)
    }

    /// Best effort bodyless response, sent before the connection is closed.
    pub async fn write_status(&mut self, status: StatusCode) -> Result<(), SendError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let mut buf = BytesMut::new();
        let head: Message<(ResponseHead, PayloadSize), Bytes> = Message::Header((response_head(status, headers), PayloadSize::Empty));
        ResponseEncoder::new().encode(head, &mut buf)?;
        self.write_raw(&buf).await
    }
}
