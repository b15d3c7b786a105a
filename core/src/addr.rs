//! Shadowsocks address header, shared between the SOCKS5 request shape on
//! the local side and the decode step on the remote side.
//!
//! The local side never constructs this type: the SOCKS5 request bytes
//! from the address tag through the port are already in this exact shape,
//! so the local forwards that slice verbatim as the raw address. Only the
//! remote decodes it, to learn the dial target.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::Error;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressHeader {
    Ipv4 { addr: [u8; 4], port: u16 },
    Domain { host: String, port: u16 },
}

impl AddressHeader {
    /// Re-encodes the header as `tag ∥ body ∥ portBE`, the same shape the
    /// SOCKS5 request carries it in.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AddressHeader::Ipv4 { addr, port } => {
                let mut out = Vec::with_capacity(7);
                out.push(ATYP_IPV4);
                out.extend_from_slice(addr);
                out.extend_from_slice(&port.to_be_bytes());
                out
            }
            AddressHeader::Domain { host, port } => {
                assert!(
                    host.len() <= 255,
                    "domain {host:?} is {} bytes, exceeds the 255-byte header length field",
                    host.len()
                );
                let mut out = Vec::with_capacity(4 + host.len());
                out.push(ATYP_DOMAIN);
                out.push(host.len() as u8);
                out.extend_from_slice(host.as_bytes());
                out.extend_from_slice(&port.to_be_bytes());
                out
            }
        }
    }

    /// The dial target, as a string suitable for `TcpStream::connect`.
    pub fn target(&self) -> String {
        match self {
            AddressHeader::Ipv4 { addr, port } => {
                format!("{}.{}.{}.{}:{}", addr[0], addr[1], addr[2], addr[3], port)
            }
            AddressHeader::Domain { host, port } => format!("{host}:{port}"),
        }
    }

    /// Reads one address header from a decrypted byte stream, minimally:
    /// one tag byte, then exactly the bytes the tag says follow. Any tag
    /// other than IPv4 or domain (including the reserved IPv6 tag) fails
    /// without consuming the port bytes.
    pub async fn decode<R>(reader: &mut R) -> Result<Self, Error>
    where
        R: AsyncRead + Unpin,
    {
        let mut tag = [0u8; 1];
        reader.read_exact(&mut tag).await?;
        match tag[0] {
            ATYP_IPV4 => {
                let mut body = [0u8; 6];
                reader.read_exact(&mut body).await?;
                let addr = [body[0], body[1], body[2], body[3]];
                let port = u16::from_be_bytes([body[4], body[5]]);
                Ok(AddressHeader::Ipv4 { addr, port })
            }
            ATYP_DOMAIN => {
                let mut len_buf = [0u8; 1];
                reader.read_exact(&mut len_buf).await?;
                let len = len_buf[0] as usize;
                let mut body = vec![0u8; len + 2];
                reader.read_exact(&mut body).await?;
                let host = String::from_utf8_lossy(&body[..len]).into_owned();
                let port = u16::from_be_bytes([body[len], body[len + 1]]);
                Ok(AddressHeader::Domain { host, port })
            }
            ATYP_IPV6 | _ => Err(Error::UnsupportedAddressType),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn ipv4_round_trips() {
        let header = AddressHeader::Ipv4 {
            addr: [93, 184, 216, 34],
            port: 0x01BB,
        };
        let encoded = header.encode();
        let mut cursor = Cursor::new(encoded);
        let decoded = AddressHeader::decode(&mut cursor).await.unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.target(), "93.184.216.34:443");
    }

    #[tokio::test]
    async fn domain_round_trips() {
        let header = AddressHeader::Domain {
            host: "example.com".to_string(),
            port: 80,
        };
        let encoded = header.encode();
        assert_eq!(
            encoded,
            vec![
                0x03, 0x0B, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm',
                0x00, 0x50
            ]
        );
        let mut cursor = Cursor::new(encoded);
        let decoded = AddressHeader::decode(&mut cursor).await.unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.target(), "example.com:80");
    }

    #[tokio::test]
    async fn reserved_ipv6_tag_is_rejected() {
        let mut cursor = Cursor::new(vec![0x04, 0, 0, 0, 0]);
        let err = AddressHeader::decode(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedAddressType));
    }

    #[tokio::test]
    async fn unknown_tag_is_rejected_without_overreading() {
        let mut cursor = Cursor::new(vec![0x7f]);
        let err = AddressHeader::decode(&mut cursor).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedAddressType));
    }
}
