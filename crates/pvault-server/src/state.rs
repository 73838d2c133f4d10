//! Shared application state for the `pvault` server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use pvault_core::vault::Vault;

use crate::rate_limit::RateLimiter;

/// Unlock attempts allowed per window.
const UNLOCK_MAX_ATTEMPTS: usize = 5;

/// Unlock rate-limit window.
const UNLOCK_WINDOW: Duration = Duration::from_secs(60);

/// Session-token file written by the server, mode 0600.
const SESSION_FILE: &str = ".session";

/// Shared state passed to all HTTP handlers via `Arc`.
pub struct AppState {
    /// The single shared vault instance.
    pub vault: Arc<Vault>,
    /// Sliding-window limiter guarding `POST /vault/unlock`.
    pub unlock_limiter: RateLimiter,
}

impl AppState {
    /// Build the state around a vault handle.
    #[must_use]
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            unlock_limiter: RateLimiter::new(UNLOCK_MAX_ATTEMPTS, UNLOCK_WINDOW),
        }
    }

    fn session_path(&self) -> PathBuf {
        self.vault.dir().join(SESSION_FILE)
    }

    /// Persist the current session token for local clients. Best-effort:
    /// a failure is logged, not fatal.
    pub fn write_session_file(&self, token: &str) {
        if let Err(e) = write_mode_0600(&self.session_path(), &format!("{token}\n")) {
            warn!(error = %e, "failed to write session file");
        }
    }

    /// Remove the session token file, ignoring a missing file.
    pub fn remove_session_file(&self) {
        if let Err(e) = std::fs::remove_file(self.session_path()) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove session file");
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Write a small text file with owner-only permissions.
pub fn write_mode_0600(path: &std::path::Path, contents: &str) -> std::io::Result<()> {
    use std::io::Write;

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents.as_bytes())
    }
    #[cfg(not(unix))]
    {
        std::fs::write(path, contents)
    }
}
