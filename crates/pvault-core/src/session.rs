//! In-memory session: master key, session token, idle auto-lock.
//!
//! A session is created on a successful unlock and owns the only resident
//! copy of the master key. The key buffer is page-locked where the platform
//! allows and zeroized before the token is cleared, on explicit destroy and
//! on idle expiry alike.
//!
//! The auto-lock timer is a spawned watcher task that sleeps until the idle
//! deadline. `touch` pushes the deadline forward; the watcher wakes, sees a
//! fresh deadline, and goes back to sleep. When the deadline truly elapses
//! the watcher zeroizes the key under the session mutex and then completes
//! the caller-supplied expiry future, which detaches the session from its
//! owner.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use zeroize::Zeroize;

use crate::crypto::{self, EncryptionKey, KEY_LEN};
use crate::hardening;

/// Idle time after which the session destroys itself.
pub const DEFAULT_AUTO_LOCK_TTL: Duration = Duration::from_secs(30 * 60);

/// Length of the session token in bytes (hex-encoded to 64 characters).
const TOKEN_LEN: usize = 32;

struct SessionInner {
    token: String,
    key: Option<Box<[u8; KEY_LEN]>>,
    deadline: Instant,
    ttl: Duration,
}

impl SessionInner {
    /// Zero the key buffer, then clear the token. Order matters: the key
    /// must never outlive the token's validity.
    fn expire(&mut self) {
        if let Some(mut key) = self.key.take() {
            hardening::unlock_memory(key.as_slice());
            key.zeroize();
        }
        self.token.clear();
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.expire();
    }
}

/// The live session. At most one exists per process.
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
    watcher: JoinHandle<()>,
}

fn lock_inner(inner: &Mutex<SessionInner>) -> MutexGuard<'_, SessionInner> {
    // A poisoned mutex still holds coherent data; recover rather than stay
    // locked forever.
    inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl Session {
    /// Create a session from a master key copy and arm the idle timer.
    ///
    /// The key is copied in, so the caller can (and should) zero its own
    /// copy immediately. `on_expire` runs exactly once if the idle deadline
    /// elapses; it does not run on explicit [`destroy`](Session::destroy).
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        master_key: &EncryptionKey,
        ttl: Duration,
        on_expire: impl Future<Output = ()> + Send + 'static,
    ) -> Self {
        let mut token_bytes = [0u8; TOKEN_LEN];
        rand::rngs::OsRng.fill_bytes(&mut token_bytes);

        let key = Box::new(*master_key.as_bytes());
        hardening::lock_memory(key.as_slice());
        hardening::disable_core_dumps();

        let inner = Arc::new(Mutex::new(SessionInner {
            token: hex::encode(token_bytes),
            key: Some(key),
            deadline: Instant::now() + ttl,
            ttl,
        }));

        let watcher = tokio::spawn({
            let inner = Arc::clone(&inner);
            async move {
                loop {
                    let deadline = lock_inner(&inner).deadline;
                    tokio::time::sleep_until(deadline).await;
                    let expired = {
                        let mut guard = lock_inner(&inner);
                        if Instant::now() >= guard.deadline {
                            guard.expire();
                            true
                        } else {
                            false
                        }
                    };
                    if expired {
                        break;
                    }
                }
                tracing::info!("session idle deadline elapsed, auto-locking");
                on_expire.await;
            }
        });

        Self { inner, watcher }
    }

    /// The session token.
    #[must_use]
    pub fn token(&self) -> String {
        lock_inner(&self.inner).token.clone()
    }

    /// Validate a presented token in constant time.
    ///
    /// Always false once the session has been destroyed (empty token).
    #[must_use]
    pub fn validate_token(&self, token: &str) -> bool {
        let guard = lock_inner(&self.inner);
        if guard.token.is_empty() {
            return false;
        }
        crypto::constant_time_eq(guard.token.as_bytes(), token.as_bytes())
    }

    /// A zeroize-on-drop copy of the master key, or `None` after destroy.
    #[must_use]
    pub fn master_key(&self) -> Option<EncryptionKey> {
        let guard = lock_inner(&self.inner);
        guard.key.as_ref().map(|k| EncryptionKey::from_bytes(**k))
    }

    /// Reset the idle timer to the full TTL.
    pub fn touch(&self) {
        let mut guard = lock_inner(&self.inner);
        guard.deadline = Instant::now() + guard.ttl;
    }

    /// Zero the key, clear the token, and stop the watcher.
    pub fn destroy(&self) {
        lock_inner(&self.inner).expire();
        self.watcher.abort();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The watcher holds a clone of `inner`; aborting it releases that
        // clone so the key zeroizes via SessionInner::drop.
        self.watcher.abort();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
