//! Multi-tenant tunnel dispatcher: one listening port per password,
//! decrypting, dialing the address embedded in the tunnel's opening bytes,
//! and relaying bytes bidirectionally.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session;

pub use error::Error;

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use config::{Cli, Config};
use dispatcher::Dispatcher;

/// Loads configuration, starts one listener per `port_password` entry,
/// installs the SIGHUP reload handler, then parks forever while the
/// spawned listener tasks serve sessions. Returns only on a fatal startup
/// error (bad config, bind failure).
pub async fn run(cli: Cli) -> Result<(), Error> {
    let config_path = PathBuf::from(&cli.config);
    let mut config = Config::load(&config_path).unwrap_or_default();
    config.apply_cli(&cli);

    let map = config.port_password_map()?;
    let dispatcher = Arc::new(Dispatcher::new(config.cache_enctable, config.idle_timeout()));
    dispatcher.apply(&map).await?;

    spawn_reload(dispatcher, config_path);

    std::future::pending::<()>().await;
    Ok(())
}

#[cfg(unix)]
fn spawn_reload(dispatcher: Arc<Dispatcher>, config_path: PathBuf) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!("failed to install SIGHUP handler: {e}");
                return;
            }
        };
        loop {
            hangup.recv().await;
            info!("SIGHUP received, reloading {}", config_path.display());
            let config = match Config::load(&config_path) {
                Ok(c) => c,
                Err(e) => {
                    error!("reload failed: {e}");
                    continue;
                }
            };
            match config.port_password_map() {
                Ok(map) => {
                    if let Err(e) = dispatcher.reload(&map).await {
                        error!("reload failed: {e}");
                    }
                }
                Err(e) => error!("reload failed: {e}"),
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload(_dispatcher: Arc<Dispatcher>, _config_path: PathBuf) {}
