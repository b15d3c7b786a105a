//! Local session handler: glue SOCKS5 handshake -> server pool -> relay
//! for one accepted client connection.

use std::sync::Arc;

use log::debug;
use tcproxy_core::relay::relay;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::Error;
use crate::pool::ServerPool;
use crate::socks5;

pub async fn handle(client: TcpStream, pool: Arc<ServerPool>) {
    if let Err(e) = handle_inner(client, pool).await {
        debug!("session ended: {e}");
    }
}

async fn handle_inner(mut client: TcpStream, pool: Arc<ServerPool>) -> Result<(), Error> {
    socks5::negotiate(&mut client).await?;
    let raw_address = socks5::read_request(&mut client).await?;

    // The success reply is sent before the remote dial is even attempted:
    // a deliberate latency optimization. A failed dial below then just
    // looks like a reset to the SOCKS5 client.
    client
        .write_all(&socks5::SUCCESS_REPLY)
        .await
        .map_err(tcproxy_core::Error::from)?;

    let remote = pool.select(&raw_address).await?;
    relay(client, remote).await;
    Ok(())
}
