//! Source/sink abstractions that decouple the sender and receiver
//! engines from concrete files: the server reads a `Source`, the client
//! writes a `Sink`.

use crate::error::Result;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Readable byte source for the sender engine. A read of zero bytes means
/// the source is exhausted.
pub trait Source {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Writable byte sink for the receiver engine.
pub trait Sink {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()>;
}

impl<T: AsyncRead + Unpin + Send> Source for T {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.read(buf).await?)
    }
}

impl<T: AsyncWrite + Unpin + Send> Sink for T {
    async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.write_all(data).await?;
        Ok(())
    }
}
