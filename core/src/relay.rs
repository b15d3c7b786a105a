//! Bidirectional relay: pump bytes both ways between two duplex
//! endpoints, closing both the moment either direction ends.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const BUF_SIZE: usize = 8 * 1024;

/// Relays `a` <-> `b` until either direction hits EOF or an error.
/// `copy_bidirectional` shuts down the opposite writer as soon as one
/// direction reaches EOF; both endpoints are owned here and close outright
/// when this function returns, which unblocks whichever direction was
/// still pending.
pub async fn relay<A, B>(mut a: A, mut b: B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::io::copy_bidirectional(&mut a, &mut b).await {
        Ok((a_to_b, b_to_a)) => {
            log::debug!("relay closed: {a_to_b} bytes a->b, {b_to_a} bytes b->a")
        }
        Err(e) => log::debug!("relay error: {e}"),
    }
}

/// Same contract as [`relay`], but each read on either direction is bound
/// by an idle deadline that resets on every successful read. Used by the
/// remote dispatcher, which has no equivalent on the local side.
pub async fn relay_with_idle_timeout<A, B>(a: A, b: B, idle: Duration)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (ar, aw) = tokio::io::split(a);
    let (br, bw) = tokio::io::split(b);

    let a_to_b = copy_with_deadline(ar, bw, idle);
    let b_to_a = copy_with_deadline(br, aw, idle);

    tokio::pin!(a_to_b);
    tokio::pin!(b_to_a);

    tokio::select! {
        res = &mut a_to_b => log_copy_result("a->b", res),
        res = &mut b_to_a => log_copy_result("b->a", res),
    }
    // Falling through here drops both pinned futures, releasing every
    // split half and so closing both original endpoints.
}

fn log_copy_result(direction: &str, res: io::Result<u64>) {
    match res {
        Ok(n) => log::debug!("relay {direction} closed after {n} bytes"),
        Err(e) => log::debug!("relay {direction} error: {e}"),
    }
}

async fn copy_with_deadline<R, W>(mut reader: R, mut writer: W, idle: Duration) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = [0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        let read = tokio::time::timeout(idle, reader.read(&mut buf)).await;
        let n = match read {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => return Err(io::Error::new(io::ErrorKind::TimedOut, "idle timeout")),
        };
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    let _ = writer.shutdown().await;
    Ok(total)
}
