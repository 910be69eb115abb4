//! NDJSON framing over a tokio reader/writer pair.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use super::{Channel, ChannelError};

/// Largest accepted line, newline included.
pub const MAX_LINE_SIZE: usize = 64 * 1024 * 1024;

/// One JSON document per line.
///
/// Partially received lines are kept across calls to [`Channel::read`], so
/// a read abandoned mid-line loses nothing.
pub struct StreamChannel<R, W, Out, In> {
    reader: BufReader<R>,
    writer: BufWriter<W>,
    buffer: Vec<u8>,
    closed: bool,
    _messages: PhantomData<fn(Out) -> In>,
}

impl<R, W, Out, In> StreamChannel<R, W, Out, In>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
            buffer: Vec::new(),
            closed: false,
            _messages: PhantomData,
        }
    }
}

#[async_trait]
impl<R, W, Out, In> Channel<Out, In> for StreamChannel<R, W, Out, In>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    Out: Serialize + Send + 'static,
    In: DeserializeOwned + Send + 'static,
{
    async fn write(&mut self, message: Out) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }

        let mut line = serde_json::to_vec(&message).map_err(ChannelError::SerializeFailed)?;
        line.push(b'\n');

        let result = async {
            self.writer.write_all(&line).await?;
            self.writer.flush().await
        }
        .await;

        result.map_err(|err| {
            if err.kind() == std::io::ErrorKind::BrokenPipe {
                self.closed = true;
            }
            ChannelError::WriteFailed(err)
        })
    }

    async fn read(&mut self) -> Result<Option<In>, ChannelError> {
        loop {
            let n = self
                .reader
                .read_until(b'\n', &mut self.buffer)
                .await
                .map_err(ChannelError::ReadFailed)?;

            if self.buffer.len() > MAX_LINE_SIZE {
                self.buffer.clear();
                return Err(ChannelError::TooLarge(MAX_LINE_SIZE));
            }

            if n == 0 {
                // EOF; a trailing unterminated line still counts as a message.
                self.closed = true;
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    self.buffer.clear();
                    return Ok(None);
                }
            } else if self.buffer.last() != Some(&b'\n') {
                continue;
            }

            let line = std::mem::take(&mut self.buffer);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return serde_json::from_slice(&line)
                .map(Some)
                .map_err(ChannelError::DeserializeFailed);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer
            .shutdown()
            .await
            .map_err(ChannelError::WriteFailed)
    }
}
