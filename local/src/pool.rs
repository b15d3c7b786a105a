//! Local server pool: round-robin with failover across one or more
//! remotes, each carrying its own (possibly shared) encryption table.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::warn;
use tcproxy_core::conn::dial;
use tcproxy_core::{EncryptionTable, StreamConnection};
use tokio::net::TcpStream;

use crate::config::Config;
use crate::error::Error;

/// One reachable remote: its dial address and the table to speak to it
/// with. Distinct entries may share the same `Arc<EncryptionTable>` when
/// they were built from the same password (the multi-host, single
/// password case, and deduplicated multi-password maps).
#[derive(Clone)]
pub struct ServerEntry {
    pub addr: String,
    pub table: Arc<EncryptionTable>,
}

pub struct ServerPool {
    entries: Vec<ServerEntry>,
    counter: AtomicU8,
}

impl ServerPool {
    pub fn new(entries: Vec<ServerEntry>) -> Result<Self, Error> {
        if entries.is_empty() {
            return Err(Error::ConfigInvalid(
                "server pool must have at least one entry".to_string(),
            ));
        }
        Ok(Self {
            entries,
            counter: AtomicU8::new(0),
        })
    }

    /// Builds the pool from a loaded [`Config`], materializing it in
    /// whichever of the two configuration shapes the config uses.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        if let Some(server_password) = &config.server_password {
            return Self::from_server_password_map(server_password);
        }
        Self::from_single_password(config)
    }

    fn from_single_password(config: &Config) -> Result<Self, Error> {
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| Error::ConfigInvalid("password is required".to_string()))?;
        let table = Arc::new(EncryptionTable::new(password));
        let default_port = config.server_port.unwrap_or(8388);

        let hosts = config.server_hosts();
        if hosts.is_empty() {
            return Err(Error::ConfigInvalid("server is required".to_string()));
        }

        let entries = hosts
            .into_iter()
            .map(|host| ServerEntry {
                addr: with_default_port(&host, default_port),
                table: table.clone(),
            })
            .collect();
        Self::new(entries)
    }

    fn from_server_password_map(map: &HashMap<String, String>) -> Result<Self, Error> {
        let mut tables: HashMap<&str, Arc<EncryptionTable>> = HashMap::new();
        let mut entries = Vec::with_capacity(map.len());
        for (host_port, password) in map {
            if !host_port.contains(':') {
                return Err(Error::ConfigInvalid(format!(
                    "server_password entry '{host_port}' is missing a port"
                )));
            }
            let table = tables
                .entry(password.as_str())
                .or_insert_with(|| Arc::new(EncryptionTable::new(password)))
                .clone();
            entries.push(ServerEntry {
                addr: host_port.clone(),
                table,
            });
        }
        Self::new(entries)
    }

    /// Dials the next server per the round-robin/failover policy and
    /// writes `raw_address` as the tunnel preamble.
    pub async fn select(
        &self,
        raw_address: &[u8],
    ) -> Result<StreamConnection<TcpStream>, Error> {
        if self.entries.len() == 1 {
            let entry = &self.entries[0];
            return dial(raw_address, &entry.addr, entry.table.clone())
                .await
                .map_err(Error::from);
        }

        let n = self.entries.len();
        let start = self.counter.fetch_add(1, Ordering::Relaxed) as usize;
        for i in 0..n {
            let entry = &self.entries[(start + i) % n];
            match dial(raw_address, &entry.addr, entry.table.clone()).await {
                Ok(conn) => return Ok(conn),
                Err(e) => warn!("server {} refused the session: {e}", entry.addr),
            }
        }
        warn!("all {n} servers failed for this session");
        Err(Error::Core(tcproxy_core::Error::AllServersFailed))
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }
}

fn with_default_port(host: &str, default_port: u16) -> String {
    if host.starts_with('[') {
        // bracketed IPv6, e.g. "[::1]" or "[::1]:8388"
        let has_port = host
            .rsplit_once(']')
            .map(|(_, rest)| rest.starts_with(':'))
            .unwrap_or(false);
        if has_port {
            host.to_string()
        } else {
            format!("{host}:{default_port}")
        }
    } else if host.matches(':').count() > 1 {
        // bare IPv6 literal, e.g. "::1" - never "host:port" shaped
        format!("[{host}]:{default_port}")
    } else if host.rsplit_once(':').is_some() {
        host.to_string()
    } else {
        format!("{host}:{default_port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(addr: &str) -> ServerEntry {
        ServerEntry {
            addr: addr.to_string(),
            table: Arc::new(EncryptionTable::new("test")),
        }
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(ServerPool::new(Vec::new()).is_err());
    }

    #[test]
    fn with_default_port_keeps_an_embedded_port() {
        assert_eq!(with_default_port("1.2.3.4:9000", 8388), "1.2.3.4:9000");
        assert_eq!(with_default_port("1.2.3.4", 8388), "1.2.3.4:8388");
    }

    #[test]
    fn with_default_port_brackets_a_bare_ipv6_literal() {
        assert_eq!(with_default_port("::1", 8388), "[::1]:8388");
        assert_eq!(with_default_port("[::1]", 8388), "[::1]:8388");
        assert_eq!(with_default_port("[::1]:9000", 8388), "[::1]:9000");
    }

    #[tokio::test]
    async fn round_robin_visits_every_entry_in_sequence() {
        let pool = ServerPool::new(vec![entry("a:1"), entry("b:1"), entry("c:1")]).unwrap();
        // We can't actually dial these, but we can check the counter math
        // directly against the documented post-increment semantics.
        let n = pool.entries().len();
        let mut starts = Vec::new();
        for _ in 0..(2 * n) {
            starts.push(pool.counter.fetch_add(1, Ordering::Relaxed) as usize % n);
        }
        assert_eq!(starts, vec![0, 1, 2, 0, 1, 2]);
    }
}
