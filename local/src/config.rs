//! Local-side configuration: JSON file plus CLI override, with the CLI
//! values taking precedence over the file.

use std::collections::HashMap;
use std::path::Path;

use clap::Parser;
use serde::Deserialize;

use crate::error::Error;

/// Accepts either a single host string or an array of host strings for
/// the `server` key, matching the historical config format.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ServerField {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    server: Option<ServerField>,
    pub server_port: Option<u16>,
    pub local_port: Option<u16>,
    pub password: Option<String>,
    #[allow(dead_code)]
    pub timeout: Option<u64>,
    pub server_password: Option<HashMap<String, String>>,
}

impl Config {
    pub fn server_hosts(&self) -> Vec<String> {
        match &self.server {
            None => Vec::new(),
            Some(ServerField::One(host)) => vec![host.clone()],
            Some(ServerField::Many(hosts)) => hosts.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path)
            .map_err(|e| Error::ConfigInvalid(format!("reading {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::ConfigInvalid(format!("parsing {}: {e}", path.display())))
    }

    /// Applies CLI overrides in place; a flag that was actually passed
    /// always wins over the file's value.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(server) = &cli.server {
            self.server = Some(ServerField::One(server.clone()));
        }
        if let Some(port) = cli.server_port {
            self.server_port = Some(port);
        }
        if let Some(port) = cli.local_port {
            self.local_port = Some(port);
        }
        if let Some(password) = &cli.password {
            self.password = Some(password.clone());
        }
        if let Some(timeout) = cli.timeout {
            self.timeout = Some(timeout);
        }
    }
}

/// CLI flags overriding the config file.
#[derive(Debug, Parser)]
#[command(name = "tc-local", about = "SOCKS5 front-end for the encrypted tunnel")]
pub struct Cli {
    /// Config file path.
    #[arg(short = 'c', long, default_value = "config.json")]
    pub config: String,

    /// Remote host (overrides `server`).
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Remote port (overrides `server_port`).
    #[arg(short = 'p', long)]
    pub server_port: Option<u16>,

    /// Local SOCKS5 listening port (overrides `local_port`).
    #[arg(short = 'l', long)]
    pub local_port: Option<u16>,

    /// Shared password (overrides `password`).
    #[arg(short = 'k', long)]
    pub password: Option<String>,

    /// Idle timeout in seconds, accepted for config-format parity with the
    /// remote binary; unused on the local side.
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Verbosity flag, accepted for config-format parity; logging is
    /// controlled via `RUST_LOG`.
    #[arg(short = 'd', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_single_server_string() {
        let config: Config = serde_json::from_str(
            r#"{"server": "example.com", "server_port": 8388, "local_port": 1080, "password": "x"}"#,
        )
        .unwrap();
        assert_eq!(config.server_hosts(), vec!["example.com".to_string()]);
    }

    #[test]
    fn accepts_an_array_of_servers() {
        let config: Config = serde_json::from_str(
            r#"{"server": ["a.example.com", "b.example.com"], "password": "x"}"#,
        )
        .unwrap();
        assert_eq!(
            config.server_hosts(),
            vec!["a.example.com".to_string(), "b.example.com".to_string()]
        );
    }

    #[test]
    fn accepts_a_server_password_map() {
        let config: Config = serde_json::from_str(
            r#"{"server_password": {"a.example.com:1": "x", "b.example.com:2": "y"}}"#,
        )
        .unwrap();
        assert_eq!(config.server_password.unwrap().len(), 2);
    }
}
