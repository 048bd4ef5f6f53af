//! Server configuration.
//!
//! Configuration comes either from the positional command line
//! (`warden [port] [interface] [pool size]`) or from a YAML document passed
//! with `--config <file>`. Every field has a default, so a partial document or
//! an empty argument list yields a working server on `127.0.0.1:8080`.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_INTERFACE: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POOL_SIZE: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub resources: ResourceConfig,
}

/// Listener, worker pool and per-connection limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g. "127.0.0.1" or "0.0.0.0")
    pub interface: String,
    pub port: u16,
    /// Maximum number of connections served at the same time
    pub pool_size: usize,
    /// Idle timeout applied to every socket read
    pub read_timeout_secs: u64,
    /// Requests served on one keep-alive connection before it is closed
    pub max_requests_per_connection: usize,
    /// Largest request body accepted, in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory served by GET; uploads land in `<root>/uploads`
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: DEFAULT_INTERFACE.to_string(),
            port: DEFAULT_PORT,
            pool_size: DEFAULT_POOL_SIZE,
            read_timeout_secs: 30,
            max_requests_per_connection: 100,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("resources"),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments.
    pub fn load() -> anyhow::Result<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();

        match args.as_slice() {
            [flag, path, ..] if flag == "--config" => Self::from_file(path),
            _ => Ok(Self::from_args(args)),
        }
    }

    /// Builds a configuration from positional arguments: `port`, `interface`,
    /// `pool size`. Missing arguments keep their defaults; invalid ones fall back
    /// to the default with a warning.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cfg = Self::default();
        let mut args = args.into_iter();

        if let Some(port) = args.next() {
            match port.as_ref().parse::<u16>() {
                Ok(port) => cfg.server.port = port,
                Err(_) => tracing::warn!(
                    value = port.as_ref(),
                    default = DEFAULT_PORT,
                    "Invalid port number, using default"
                ),
            }
        }

        if let Some(interface) = args.next() {
            let interface = interface.as_ref().trim();
            if !interface.is_empty() {
                cfg.server.interface = interface.to_string();
            }
        }

        if let Some(pool_size) = args.next() {
            match pool_size.as_ref().parse::<usize>() {
                Ok(n) if n > 0 => cfg.server.pool_size = n,
                _ => tracing::warn!(
                    value = pool_size.as_ref(),
                    default = DEFAULT_POOL_SIZE,
                    "Invalid pool size, using default"
                ),
            }
        }

        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let mut cfg: Config = serde_yaml::from_str(yaml).context("Invalid YAML configuration")?;
        if cfg.server.pool_size == 0 {
            cfg.server.pool_size = 1;
        }
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw)
    }

    /// `interface:port` string suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.interface, self.server.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.server.read_timeout_secs)
    }
}
