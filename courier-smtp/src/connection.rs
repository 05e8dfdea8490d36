use std::fmt::Display;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Buffered line-oriented access to a client stream
pub(crate) struct Connection<Stream> {
    stream: BufReader<Stream>,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Connection<Stream> {
    pub(crate) fn new(stream: Stream) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Read up to and including the next `\n`, but never more than `limit`
    /// bytes. Returns 0 once the client has closed its side.
    pub(crate) async fn read_line(&mut self, limit: usize, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        (&mut self.stream)
            .take(u64::try_from(limit).unwrap_or(u64::MAX))
            .read_until(b'\n', buf)
            .await
    }

    /// Consume the remainder of an over-long line
    pub(crate) async fn send(&mut self, line: &impl Display) -> std::io::Result<()> {
        let writer = self.stream.get_mut();
        writer.write_all(format!("{line}\r\n").as_bytes()).await?;
        writer.flush().await
    }
}
