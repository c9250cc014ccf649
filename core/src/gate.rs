//! Single-use completion gate.
//!
//! A gate starts unsignaled, is signaled once by whichever thread receives
//! the transport's callback, and releases the thread blocked in [`wait`].
//! The flag lives under a mutex, so everything the signaling thread wrote
//! before [`signal`] is visible to the thread that returns from [`wait`].
//!
//! [`wait`]: CompletionGate::wait
//! [`signal`]: CompletionGate::signal

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// One-permit gate: `signal` once, `wait` until signaled.
#[derive(Debug, Default)]
pub struct CompletionGate {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the gate signaled and wake the waiter.
    ///
    /// Returns `false` if the gate was already signaled; the repeat call
    /// changes nothing.
    pub fn signal(&self) -> bool {
        let mut signaled = self.lock();
        if *signaled {
            return false;
        }
        *signaled = true;
        drop(signaled);
        self.condvar.notify_all();
        true
    }

    /// Block until [`signal`](Self::signal) has been called.
    ///
    /// Returns immediately if the signal already happened. There is no
    /// timeout: if nobody ever signals, this never returns.
    pub fn wait(&self) {
        let mut signaled = self.lock();
        while !*signaled {
            signaled = self
                .condvar
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn is_signaled(&self) -> bool {
        *self.lock()
    }

    // The guarded state is a plain flag, so a panic elsewhere cannot leave it
    // half-written.
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
