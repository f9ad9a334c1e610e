//! Byte streams the codecs read from and write to.
//!
//! Every await on an underlying stream checks the [`CancellationToken`] before and after
//! suspending; cancellation wins when both the token and the I/O are ready.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, WireError};
use crate::varint::read_varint;

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(WireError::Cancelled)
    } else {
        Ok(())
    }
}

#[async_trait]
pub trait WireRead: Send {
    /// Reads exactly `n` bytes, or fails with [`WireError::StreamClosed`].
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>>;

    async fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1).await?[0])
    }

    fn cancellation(&self) -> &CancellationToken;
}

/// Append-only sink.
#[async_trait]
pub trait WireWrite: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

#[async_trait]
impl WireWrite for Vec<u8> {
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Whether a bounded region has more bytes to decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Next {
    More,
    /// The region is exhausted. Ends element and field loops; not an error.
    EndOfSubStream,
}

/// An in-memory region holding exactly the bytes of one length-prefixed value.
#[derive(Debug)]
pub struct SubStream {
    bytes: Vec<u8>,
    position: usize,
    cancel: CancellationToken,
}

impl SubStream {
    pub fn new(bytes: Vec<u8>, cancel: CancellationToken) -> Self {
        Self {
            bytes,
            position: 0,
            cancel,
        }
    }

    /// Reads a varint length followed by that many bytes from `input`.
    pub async fn read_region(input: &mut dyn WireRead) -> Result<Self> {
        let length = read_varint(input).await?;
        let length = usize::try_from(length).map_err(|_| WireError::NumberOutOfRange {
            target: "a region length",
        })?;
        let bytes = input.read_exact(length).await?;
        Ok(Self::new(bytes, input.cancellation().clone()))
    }

    pub fn peek(&self) -> Next {
        if self.position < self.bytes.len() {
            Next::More
        } else {
            Next::EndOfSubStream
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }
}

#[async_trait]
impl WireRead for SubStream {
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        ensure_active(&self.cancel)?;
        let available = self.remaining();
        if n > available {
            return Err(WireError::StreamClosed {
                expected: n,
                available,
            });
        }
        let bytes = self.bytes[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(bytes)
    }

    async fn read_u8(&mut self) -> Result<u8> {
        ensure_active(&self.cancel)?;
        let byte = *self
            .bytes
            .get(self.position)
            .ok_or(WireError::StreamClosed {
                expected: 1,
                available: 0,
            })?;
        self.position += 1;
        Ok(byte)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Adapts a tokio [`AsyncRead`] to [`WireRead`].
pub struct StreamReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R> StreamReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(inner: R) -> Self {
        Self::with_cancellation(inner, CancellationToken::new())
    }

    pub fn with_cancellation(inner: R, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

#[async_trait]
impl<R> WireRead for StreamReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        ensure_active(&self.cancel)?;

        // bounded by `take`; `n` is never preallocated
        let mut bytes = Vec::new();
        let mut limited = (&mut self.inner).take(n as u64);
        let read = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WireError::Cancelled),
            read = limited.read_to_end(&mut bytes) => read?,
        };

        ensure_active(&self.cancel)?;
        if read < n {
            return Err(WireError::StreamClosed {
                expected: n,
                available: read,
            });
        }
        Ok(bytes)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Adapts a tokio [`AsyncWrite`] to [`WireWrite`].
pub struct StreamWriter<W> {
    inner: W,
    cancel: CancellationToken,
}

impl<W> StreamWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(inner: W) -> Self {
        Self::with_cancellation(inner, CancellationToken::new())
    }

    pub fn with_cancellation(inner: W, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    pub async fn flush(&mut self) -> Result<()> {
        ensure_active(&self.cancel)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WireError::Cancelled),
            flushed = self.inner.flush() => flushed?,
        }
        ensure_active(&self.cancel)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> WireWrite for StreamWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        ensure_active(&self.cancel)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(WireError::Cancelled),
            written = self.inner.write_all(bytes) => written?,
        }
        ensure_active(&self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sub_stream_signals_end() {
        let mut region = SubStream::new(vec![1, 2, 3], CancellationToken::new());
        assert_eq!(region.peek(), Next::More);
        assert_eq!(region.read_exact(2).await.unwrap(), vec![1, 2]);
        assert_eq!(region.read_u8().await.unwrap(), 3);
        assert_eq!(region.peek(), Next::EndOfSubStream);
        assert!(matches!(
            region.read_u8().await,
            Err(WireError::StreamClosed {
                expected: 1,
                available: 0
            })
        ));
    }

    #[tokio::test]
    async fn reads_length_prefixed_region() {
        let mut outer = SubStream::new(vec![0x82, 7, 8, 9], CancellationToken::new());
        let mut region = SubStream::read_region(&mut outer).await.unwrap();
        assert_eq!(region.remaining(), 2);
        assert_eq!(region.read_exact(2).await.unwrap(), vec![7, 8]);
        assert_eq!(outer.read_u8().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn stream_reader_reports_short_stream() {
        let mut reader = StreamReader::new(&[1u8, 2][..]);
        assert!(matches!(
            reader.read_exact(3).await,
            Err(WireError::StreamClosed {
                expected: 3,
                available: 2
            })
        ));
    }

    #[tokio::test]
    async fn cancelled_reader_stops_before_reading() {
        let cancel = CancellationToken::new();
        let mut reader = StreamReader::with_cancellation(&[1u8, 2, 3][..], cancel.clone());
        assert_eq!(reader.read_u8().await.unwrap(), 1);
        cancel.cancel();
        assert!(matches!(reader.read_u8().await, Err(WireError::Cancelled)));
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_read() {
        let (client, _server) = tokio::io::duplex(64);
        let cancel = CancellationToken::new();
        let mut reader = StreamReader::with_cancellation(client, cancel.clone());
        let pending = tokio::spawn(async move { reader.read_exact(4).await });
        tokio::task::yield_now().await;
        cancel.cancel();
        assert!(matches!(pending.await.unwrap(), Err(WireError::Cancelled)));
    }

    #[tokio::test]
    async fn stream_writer_writes_through() {
        let mut writer = StreamWriter::new(Vec::new());
        writer.write_all(&[1, 2]).await.unwrap();
        writer.write_all(&[3]).await.unwrap();
        writer.flush().await.unwrap();
        assert_eq!(writer.into_inner(), vec![1, 2, 3]);
    }
}
