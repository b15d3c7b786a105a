//! Remote-side configuration: JSON file plus CLI override, with the CLI
//! values taking precedence over the file.

use std::collections::HashMap;
use std::path::Path;

use clap::Parser;
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Config {
    pub server_port: Option<u16>,
    pub password: Option<String>,
    pub port_password: Option<HashMap<u16, String>>,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub cache_enctable: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::ConfigInvalid(format!("reading {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::ConfigInvalid(format!("parsing {}: {e}", path.display())))
    }

    /// Applies CLI overrides in place; a flag that was actually passed
    /// always wins over the file's value.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.server_port {
            self.server_port = Some(port);
        }
        if let Some(password) = &cli.password {
            self.password = Some(password.clone());
        }
        if let Some(timeout) = cli.timeout {
            self.timeout = Some(timeout);
        }
        if cli.cache_enctable {
            self.cache_enctable = true;
        }
    }

    /// Materializes the `port -> password` map this config describes:
    /// `port_password`, when present, supersedes the single `(server_port,
    /// password)` pair.
    pub fn port_password_map(&self) -> Result<HashMap<u16, String>, Error> {
        if let Some(map) = &self.port_password {
            if map.is_empty() {
                return Err(Error::ConfigInvalid("port_password is empty".to_string()));
            }
            return Ok(map.clone());
        }
        let port = self
            .server_port
            .ok_or_else(|| Error::ConfigInvalid("server_port is required".to_string()))?;
        let password = self
            .password
            .clone()
            .ok_or_else(|| Error::ConfigInvalid("password is required".to_string()))?;
        let mut map = HashMap::with_capacity(1);
        map.insert(port, password);
        Ok(map)
    }

    pub fn idle_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout.unwrap_or(300))
    }
}

/// CLI flags overriding the config file, mirroring the local binary's
/// flag set for config-format parity.
#[derive(Debug, Parser)]
#[command(name = "tc-remote", about = "Multi-tenant tunnel dispatcher")]
pub struct Cli {
    /// Config file path.
    #[arg(short = 'c', long, default_value = "config.json")]
    pub config: String,

    /// Remote host, accepted for flag parity with the local binary; unused
    /// on the remote.
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Listening port (overrides `server_port`).
    #[arg(short = 'p', long)]
    pub server_port: Option<u16>,

    /// Local SOCKS5 port, accepted for flag parity; unused on the remote.
    #[arg(short = 'l', long)]
    pub local_port: Option<u16>,

    /// Shared password (overrides `password`).
    #[arg(short = 'k', long)]
    pub password: Option<String>,

    /// Idle timeout in seconds (overrides `timeout`).
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Verbosity flag, accepted for config-format parity; logging is
    /// controlled via `RUST_LOG`.
    #[arg(short = 'd', long)]
    pub verbose: bool,

    /// Persist derived tables to `table.cache` (overrides `cache_enctable`).
    #[arg(long)]
    pub cache_enctable: bool,
}
