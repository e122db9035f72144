//! Interrupt tracking.
//!
//! The handler only records that a signal arrived. Children keep the default
//! disposition (handlers are reset on exec) and die from the terminal's ^C as
//! usual; the sequencer checks the flag between steps and unwinds normally,
//! so the environment guard gets to restore the kernel tree. Restoration
//! itself never consults the flag.

use anyhow::{bail, Result};
use std::sync::atomic::{AtomicI32, Ordering};

static RECEIVED: AtomicI32 = AtomicI32::new(0);

// Per-thread so a test can fake a signal without touching its neighbours.
#[cfg(test)]
thread_local! {
    static RAISED: std::cell::Cell<i32> = const { std::cell::Cell::new(0) };
}

extern "C" fn on_signal(signo: libc::c_int) {
    RECEIVED.store(signo, Ordering::SeqCst);
}

/// Install the handler for SIGINT, SIGTERM and SIGHUP.
pub fn install() -> Result<()> {
    for signo in [libc::SIGINT, libc::SIGTERM, libc::SIGHUP] {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        // SAFETY: the handler only performs an atomic store.
        let prev = unsafe { libc::signal(signo, handler) };
        if prev == libc::SIG_ERR {
            bail!("Installing handler for signal {signo} failed");
        }
    }
    Ok(())
}

/// Signal number received so far, if any.
pub fn received() -> Option<i32> {
    let signo = RECEIVED.load(Ordering::SeqCst);
    #[cfg(test)]
    let signo = if signo == 0 {
        RAISED.with(std::cell::Cell::get)
    } else {
        signo
    };
    match signo {
        0 => None,
        signo => Some(signo),
    }
}

/// Fail if a signal has arrived.
pub fn check() -> Result<()> {
    if let Some(signo) = received() {
        bail!("Interrupted by signal {signo}");
    }
    Ok(())
}

/// Mark the current thread as having received `signo`.
#[cfg(test)]
pub fn raise(signo: i32) {
    RAISED.with(|r| r.set(signo));
}
