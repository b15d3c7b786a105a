use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported socks version")]
    UnsupportedVersion,

    #[error("unsupported socks command")]
    UnsupportedCommand,

    #[error("unsupported address type")]
    UnsupportedAddressType,

    #[error("extra data after method negotiation")]
    AuthExtraData,

    #[error("extra data after request")]
    RequestExtraData,

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("dial failed: {0}")]
    Dial(io::Error),

    #[error("all servers failed")]
    AllServersFailed,
}
