//! SOCKS5 front-end handshake: method negotiation and the CONNECT
//! request, producing the raw address bytes forwarded to the remote.
//!
//! Only method `0x00` (no auth) and command `0x01` (CONNECT) exist in this
//! core; there is no SOCKS5 failure-reply path because the local always
//! answers the request with the fixed success reply before the remote
//! dial is attempted (see [`SUCCESS_REPLY`] and the session handler that
//! sends it).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tcproxy_core::Error;

pub const SOCKS_VERSION: u8 = 0x05;
pub const CMD_CONNECT: u8 = 0x01;
pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const NO_AUTHENTICATION_REQUIRED: u8 = 0x00;

/// `[VER=5, REP=success, RSV=0, ATYP=IPv4, 0.0.0.0, 0x0843]`, sent before
/// the remote connection is proven.
pub const SUCCESS_REPLY: [u8; 10] = [0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0x08, 0x43];

/// Phase 1: reads the method-negotiation message and replies with
/// `[0x05, 0x00]` (no auth, the only method this core offers).
pub async fn negotiate<S>(stream: &mut S) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = read_at_least(stream, 2, 2 + 255).await?;
    if head[0] != SOCKS_VERSION {
        return Err(Error::UnsupportedVersion);
    }
    let nmethod = head[1] as usize;
    let _methods = complete_to_length(stream, head, 2 + nmethod).await?;

    stream.write_all(&[SOCKS_VERSION, NO_AUTHENTICATION_REQUIRED]).await?;
    Ok(())
}

/// Phase 2: reads the CONNECT request and returns the raw address bytes
/// (`tag ∥ body ∥ port`, offset 3 through the end of the request) to be
/// forwarded opaquely to the remote. Does not write any reply; the caller
/// writes [`SUCCESS_REPLY`] once it has decided to proceed.
pub async fn read_request<S>(stream: &mut S) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let head = read_at_least(stream, 5, 5 + 255 + 2).await?;
    if head[0] != SOCKS_VERSION {
        return Err(Error::UnsupportedVersion);
    }
    if head[1] != CMD_CONNECT {
        return Err(Error::UnsupportedCommand);
    }
    let atyp = head[3];
    let total = match atyp {
        ATYP_IPV4 => 10,
        ATYP_DOMAIN => 5 + head[4] as usize + 2,
        _ => return Err(Error::UnsupportedAddressType),
    };
    let request = complete_to_length(stream, head, total).await?;
    Ok(request[3..].to_vec())
}

/// Reads until at least `min` bytes have arrived, never requesting more
/// than `max` at once. A single underlying read may return more than
/// `min` bytes if the peer pipelined further data; the caller decides
/// whether that's expected pipeline (Phase 2 request) or illegal overrun
/// (extra bytes past this message) via [`complete_to_length`].
async fn read_at_least<S>(stream: &mut S, min: usize, max: usize) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max];
    let mut filled = 0;
    while filled < min {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed during socks5 handshake",
            )));
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Given bytes already read, tops them up to exactly `total` bytes, or
/// fails if more than `total` arrived already (the initial read must not
/// consume bytes belonging to the next phase).
async fn complete_to_length<S>(
    stream: &mut S,
    mut have: Vec<u8>,
    total: usize,
) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin,
{
    use std::cmp::Ordering;
    match have.len().cmp(&total) {
        Ordering::Equal => Ok(have),
        Ordering::Less => {
            let mut rest = vec![0u8; total - have.len()];
            stream.read_exact(&mut rest).await?;
            have.extend_from_slice(&rest);
            Ok(have)
        }
        Ordering::Greater => Err(extra_data_error(total)),
    }
}

fn extra_data_error(total: usize) -> Error {
    if total <= 2 + 255 {
        Error::AuthExtraData
    } else {
        Error::RequestExtraData
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn accepts_the_minimal_handshake() {
        let mut stream = Cursor::new(vec![0x05, 0x01, 0x00]);
        negotiate(&mut stream).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_extra_bytes_after_methods() {
        let mut stream = Cursor::new(vec![0x05, 0x01, 0x00, 0xFF]);
        let err = negotiate(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::AuthExtraData));
    }

    #[tokio::test]
    async fn parses_an_ipv4_connect_request() {
        let mut stream = Cursor::new(vec![0x05, 0x01, 0x00, 0x01, 93, 184, 216, 34, 0x01, 0xBB]);
        let raw = read_request(&mut stream).await.unwrap();
        assert_eq!(raw, vec![0x01, 93, 184, 216, 34, 0x01, 0xBB]);
    }

    #[tokio::test]
    async fn parses_a_domain_connect_request() {
        let mut stream = Cursor::new(vec![
            0x05, 0x01, 0x00, 0x03, 0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c',
            b'o', b'm', 0x00, 0x50,
        ]);
        let raw = read_request(&mut stream).await.unwrap();
        assert_eq!(
            raw,
            vec![0x03, 0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm', 0x00, 0x50]
        );
    }

    #[tokio::test]
    async fn unsupported_command_fails_without_reading_a_body() {
        let mut stream = Cursor::new(vec![0x05, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
        let err = read_request(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedCommand));
    }
}
