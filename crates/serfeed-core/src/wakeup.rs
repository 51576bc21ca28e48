//! Wake signal from the receive context to the drain task.
//!
//! A single pending bit built on a capacity-1 channel: `notify` is a
//! non-blocking `try_send`, so it is safe from the receive context, and a
//! notify while the bit is already set is absorbed. Waiting consumes the bit.
//! A wake says "check the ring", nothing about how many bytes arrived.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

pub struct Wakeup {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Wakeup {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Set the pending bit. Returns `true` if this call raised it, `false` if
    /// it was already pending.
    #[inline]
    pub fn notify(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            // Disconnected cannot happen: both ends live in `self`.
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => false,
        }
    }

    /// Block until the bit is set, then clear it.
    pub fn wait(&self) {
        // Both ends live in `self`, so `recv` only returns once a notify lands.
        let _ = self.rx.recv();
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`. Returns `true`
    /// if a notification was consumed. A timeout is only a reason to look at
    /// the ring again.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }

    /// Clear the bit without blocking. Returns whether it was set.
    pub fn try_clear(&self) -> bool {
        self.rx.try_recv().is_ok()
    }

    pub fn is_pending(&self) -> bool {
        !self.rx.is_empty()
    }
}

impl Default for Wakeup {
    fn default() -> Self {
        Self::new()
    }
}
