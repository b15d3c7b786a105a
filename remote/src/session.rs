//! Remote session handler: glue stream cipher -> address decode -> dial
//! -> relay for one accepted tunnel connection.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tcproxy_core::relay::relay_with_idle_timeout;
use tcproxy_core::{AddressHeader, EncryptionTable, Error, StreamConnection};
use tokio::net::TcpStream;

pub async fn handle(client: TcpStream, table: Arc<EncryptionTable>, idle: Duration) {
    if let Err(e) = handle_inner(client, table, idle).await {
        debug!("session ended: {e}");
    }
}

async fn handle_inner(
    client: TcpStream,
    table: Arc<EncryptionTable>,
    idle: Duration,
) -> Result<(), Error> {
    let mut tunnel = StreamConnection::new(client, table);
    let header = AddressHeader::decode(&mut tunnel).await?;
    let target = TcpStream::connect(header.target())
        .await
        .map_err(Error::Dial)?;
    relay_with_idle_timeout(tunnel, target, idle).await;
    Ok(())
}
