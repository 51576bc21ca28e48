//! Run state shared by the receive context, the drain task and the owner of the session.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunMode {
    Running = 0,
    /// Normal shutdown: stop receiving, deliver what is already buffered.
    Closing = 1,
    /// Fatal stop: nothing more is delivered.
    Halted = 2,
}

impl RunMode {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunMode::Running,
            1 => RunMode::Closing,
            _ => RunMode::Halted,
        }
    }
}

#[derive(Debug)]
pub struct RunState {
    mode: AtomicU8,
}

impl RunState {
    pub const fn new() -> Self {
        Self {
            mode: AtomicU8::new(RunMode::Running as u8),
        }
    }

    #[inline]
    pub fn mode(&self) -> RunMode {
        RunMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.mode() == RunMode::Running
    }

    /// Ask for a normal shutdown. Has no effect once halted.
    pub fn request_close(&self) {
        let _ = self.mode.compare_exchange(
            RunMode::Running as u8,
            RunMode::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn halt(&self) {
        self.mode.store(RunMode::Halted as u8, Ordering::Release);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
