//! SOCKS5 front-end: handshake, server pool selection, session glue.

pub mod config;
pub mod error;
pub mod pool;
pub mod session;
pub mod socks5;

pub use error::Error;

use std::path::Path;
use std::sync::Arc;

use log::info;

use config::{Cli, Config};
use pool::ServerPool;

/// Loads configuration (file + CLI overrides), builds the server pool,
/// binds the SOCKS5 listener and serves it forever. Returns only on a
/// fatal startup error (bad config, bind failure); per-session errors are
/// handled and logged inside [`session::handle`].
pub async fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::load(Path::new(&cli.config)).unwrap_or_default();
    config.apply_cli(&cli);

    let local_port = config
        .local_port
        .ok_or_else(|| Error::ConfigInvalid("local_port is required".to_string()))?;

    let pool = Arc::new(ServerPool::from_config(&config)?);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", local_port))
        .await
        .map_err(|e| Error::ConfigInvalid(format!("binding 127.0.0.1:{local_port}: {e}")))?;
    info!("socks5 listening on 127.0.0.1:{local_port}");

    loop {
        let (client, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };
        log::debug!("accepted {peer}");
        let pool = pool.clone();
        tokio::spawn(session::handle(client, pool));
    }
}
