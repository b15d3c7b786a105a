//! Remote multi-port dispatcher: one listener per password, each serving
//! sessions independently, with live reload support.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tcproxy_core::cache::{table_for, TableCache};
use tcproxy_core::EncryptionTable;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use crate::error::Error;
use crate::session;

/// One live listener: the password it was built from (kept for reload
/// diffing), a handle that stops it from accepting further connections,
/// and the task running its accept loop.
struct PortBinding {
    password: String,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

pub struct Dispatcher {
    bindings: Mutex<HashMap<u16, PortBinding>>,
    cache_path: Option<PathBuf>,
    idle: Duration,
}

impl Dispatcher {
    pub fn new(cache_enctable: bool, idle: Duration) -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
            cache_path: cache_enctable.then(|| PathBuf::from("table.cache")),
            idle,
        }
    }

    /// Starts a listener for every port in `map`. Used at startup, against
    /// an empty binding set.
    pub async fn apply(&self, map: &HashMap<u16, String>) -> Result<(), Error> {
        if map.is_empty() {
            return Err(Error::ConfigInvalid("port_password is empty".to_string()));
        }
        let mut bindings = self.bindings.lock().await;
        for (&port, password) in map {
            self.start_locked(&mut bindings, port, password).await?;
        }
        Ok(())
    }

    /// Diffs the live binding set against `new_map`: stops listeners
    /// whose port disappeared, starts listeners for new ports,
    /// and replaces listeners whose password changed. Existing sessions on
    /// a stopped or replaced listener are left to finish on their own —
    /// they hold their own `Arc<EncryptionTable>` and never consult the
    /// binding map again.
    pub async fn reload(&self, new_map: &HashMap<u16, String>) -> Result<(), Error> {
        let mut bindings = self.bindings.lock().await;

        let stale: Vec<u16> = bindings
            .keys()
            .copied()
            .filter(|p| !new_map.contains_key(p))
            .collect();
        for port in stale {
            if let Some(binding) = bindings.remove(&port) {
                let _ = binding.stop.send(());
                info!("reload: stopped listener on port {port}");
            }
        }

        for (&port, password) in new_map {
            let changed = bindings.get(&port).map(|b| &b.password != password).unwrap_or(true);
            if !changed {
                continue;
            }
            if let Some(old) = bindings.remove(&port) {
                let _ = old.stop.send(());
                // Wait for the old accept loop to actually drop its
                // TcpListener before rebinding the same port, or the bind
                // below can race it and fail with "address in use".
                let _ = old.task.await;
                info!("reload: password changed for port {port}, restarting listener");
            }
            self.start_locked(&mut bindings, port, password).await?;
        }

        Ok(())
    }

    async fn start_locked(
        &self,
        bindings: &mut HashMap<u16, PortBinding>,
        port: u16,
        password: &str,
    ) -> Result<(), Error> {
        let table = Arc::new(self.table_for(password));
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| Error::ConfigInvalid(format!("binding 0.0.0.0:{port}: {e}")))?;
        info!("listening on 0.0.0.0:{port}");

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, table, self.idle, stop_rx));

        bindings.insert(
            port,
            PortBinding {
                password: password.to_string(),
                stop: stop_tx,
                task,
            },
        );
        Ok(())
    }

    /// Derives (or loads from `table.cache`, when enabled) the table for
    /// `password`.
    fn table_for(&self, password: &str) -> EncryptionTable {
        match &self.cache_path {
            Some(path) => {
                let mut cache = TableCache::load(path);
                table_for(password, Some((&mut cache, path)))
            }
            None => EncryptionTable::new(password),
        }
    }
}

async fn serve(
    listener: TcpListener,
    table: Arc<EncryptionTable>,
    idle: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => return,
            accepted = listener.accept() => {
                let (client, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("accept failed: {e}");
                        continue;
                    }
                };
                log::debug!("accepted {peer}");
                tokio::spawn(session::handle(client, table.clone(), idle));
            }
        }
    }
}
