//! Per-connection stream cipher transport.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;

use crate::errors::Error;
use crate::table::EncryptionTable;

/// Wraps a byte transport, substituting every byte read and every byte
/// written through a shared [`EncryptionTable`]. The cipher is stateless:
/// no IV, no counter, each byte stands on its own.
pub struct StreamConnection<T> {
    inner: T,
    table: Arc<EncryptionTable>,
    write_scratch: BytesMut,
}

impl<T> StreamConnection<T> {
    pub fn new(inner: T, table: Arc<EncryptionTable>) -> Self {
        Self {
            inner,
            table,
            write_scratch: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for StreamConnection<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.table.decode_in_place(&mut buf.filled_mut()[before..]);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for StreamConnection<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.write_scratch.clear();
        this.write_scratch.resize(buf.len(), 0);
        this.table.encode_slice(&mut this.write_scratch, buf);
        Pin::new(&mut this.inner).poll_write(cx, &this.write_scratch)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Opens a transport to `remote` and writes `raw_address` through the
/// encoder as the first payload bytes, per the dial-with-preamble contract.
/// On any I/O failure during the preamble the transport is dropped (closing
/// it) and the failure is surfaced as [`Error::Dial`].
pub async fn dial(
    raw_address: &[u8],
    remote: &str,
    table: Arc<EncryptionTable>,
) -> Result<StreamConnection<TcpStream>, Error> {
    let stream = TcpStream::connect(remote).await.map_err(Error::Dial)?;
    let mut conn = StreamConnection::new(stream, table);
    conn.write_all(raw_address).await.map_err(Error::Dial)?;
    conn.flush().await.map_err(Error::Dial)?;
    Ok(conn)
}
