//! Receive-context side of the pipeline.
//!
//! Runs once per received byte with interrupt-handler constraints: it never
//! blocks, never allocates and never touches the sink.

use log::{debug, warn};

use crate::config::OverflowPolicy;
use crate::error::{BufferFull, PipelineError};
use crate::ring::{Producer, Pushed};
use crate::source::ByteSource;
use crate::stats::PipelineStats;
use crate::wakeup::Wakeup;

/// What happened to a received byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Stored; the ring was empty before it.
    StoredFirst,
    /// Stored behind bytes the drain task has not taken yet.
    Stored,
    /// Discarded because the ring was full (drop policy only).
    Dropped,
}

pub struct RxProducer<'a, const N: usize> {
    ring: Producer<'a, N>,
    wakeup: &'a Wakeup,
    stats: &'a PipelineStats,
    policy: OverflowPolicy,
    overflowing: bool,
}

impl<'a, const N: usize> RxProducer<'a, N> {
    pub fn new(
        ring: Producer<'a, N>,
        wakeup: &'a Wakeup,
        stats: &'a PipelineStats,
        policy: OverflowPolicy,
    ) -> Self {
        Self {
            ring,
            wakeup,
            stats,
            policy,
            overflowing: false,
        }
    }

    /// Receive-ready handler: read one byte from `source` and store it.
    #[inline]
    pub fn on_rx_ready<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<RxOutcome, PipelineError> {
        let byte = source.getc()?;
        self.store(byte)
    }

    /// Store one received byte and wake the drain task.
    ///
    /// Every stored byte notifies. The signal coalesces, so it is raised at
    /// most once per wake the drain task consumes. An empty-ring check alone
    /// is not enough: the drain task may empty the ring between the check
    /// and the store.
    pub fn store(&mut self, byte: u8) -> Result<RxOutcome, PipelineError> {
        self.stats.record_received();

        let outcome = match self.ring.push(byte) {
            Ok(Pushed::WasEmpty) => RxOutcome::StoredFirst,
            Ok(Pushed::Appended) => RxOutcome::Stored,
            Err(BufferFull(byte)) => return self.overflow(byte),
        };

        self.overflowing = false;
        if self.wakeup.notify() {
            self.stats.record_wakeup();
        }
        Ok(outcome)
    }

    fn overflow(&mut self, byte: u8) -> Result<RxOutcome, PipelineError> {
        match self.policy {
            OverflowPolicy::Fatal => Err(PipelineError::BufferOverflow { capacity: N, byte }),
            OverflowPolicy::DropNewest => {
                self.stats.record_dropped();
                if !self.overflowing {
                    self.overflowing = true;
                    warn!("rx ring full ({N} bytes), dropping received bytes");
                } else {
                    debug!("dropped 0x{byte:02X}");
                }
                Ok(RxOutcome::Dropped)
            }
        }
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}
