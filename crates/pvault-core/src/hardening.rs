//! Memory hardening: page locking and core-dump prevention.
//!
//! All functions here are best-effort. A development machine without
//! `CAP_IPC_LOCK` must still be able to run the vault, so failures are
//! silently ignored — the protections are defense in depth, not
//! prerequisites. Non-Unix platforms get no-ops.

/// Lock the buffer's memory pages to keep them out of swap.
#[cfg(unix)]
pub fn lock_memory(buf: &[u8]) {
    if buf.is_empty() {
        return;
    }
    // SAFETY: mlock only instructs the kernel to keep the given pages
    // resident; it does not touch the memory itself. The pointer and length
    // come from a live slice.
    #[allow(unsafe_code)]
    unsafe {
        let _ = libc::mlock(buf.as_ptr().cast(), buf.len());
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn lock_memory(_buf: &[u8]) {}

/// Unlock pages previously locked with [`lock_memory`].
#[cfg(unix)]
pub fn unlock_memory(buf: &[u8]) {
    if buf.is_empty() {
        return;
    }
    // SAFETY: see `lock_memory` — munlock is the inverse bookkeeping call.
    #[allow(unsafe_code)]
    unsafe {
        let _ = libc::munlock(buf.as_ptr().cast(), buf.len());
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn unlock_memory(_buf: &[u8]) {}

/// Set `RLIMIT_CORE` to 0 so key material cannot end up in a core dump.
#[cfg(unix)]
pub fn disable_core_dumps() {
    // SAFETY: setrlimit with a valid rlimit struct only changes the kernel's
    // willingness to write core files for this process.
    #[allow(unsafe_code)]
    unsafe {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        let _ = libc::setrlimit(libc::RLIMIT_CORE, &rlim);
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn disable_core_dumps() {}
