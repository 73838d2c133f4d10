//! Server configuration, loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Default listen port. The server always binds to loopback.
const DEFAULT_PORT: u16 = 7200;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Vault directory holding the database and key files.
    pub vault_dir: PathBuf,
    /// Loopback address to listen on.
    pub bind_addr: SocketAddr,
    /// Log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `VAULT_DIR` — vault directory (default: `$HOME/.pvault`)
    /// - `VAULT_PORT` — listen port on 127.0.0.1 (default: `7200`)
    /// - `VAULT_LOG_LEVEL` — log filter (default: `info`)
    #[must_use]
    pub fn from_env() -> Self {
        let vault_dir = std::env::var("VAULT_DIR").map_or_else(
            |_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
                PathBuf::from(home).join(".pvault")
            },
            PathBuf::from,
        );

        let port = std::env::var("VAULT_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let log_level = std::env::var("VAULT_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        Self {
            vault_dir,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], port)),
            log_level,
        }
    }
}
