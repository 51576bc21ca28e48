//! Task-context side of the pipeline.
//!
//! Drain strategy: loop until empty. One wake drains everything that is in
//! the ring, including bytes that arrive during the drain, before the task
//! suspends again.

use std::time::Duration;

use log::trace;

use crate::error::PipelineError;
use crate::ring::Consumer;
use crate::sink::ByteSink;
use crate::state::{RunMode, RunState};
use crate::stats::PipelineStats;
use crate::wakeup::Wakeup;

/// Upper bound on bytes taken from the ring per pop.
pub const MAX_DRAIN_BATCH: usize = 32;

pub struct RxConsumer<'a, const N: usize> {
    ring: Consumer<'a, N>,
    wakeup: &'a Wakeup,
    stats: &'a PipelineStats,
    batch: [u8; MAX_DRAIN_BATCH],
    batch_size: usize,
    /// Popped bytes in `batch[next..filled]` not yet accepted by the sink.
    next: usize,
    filled: usize,
}

impl<'a, const N: usize> RxConsumer<'a, N> {
    pub fn new(
        ring: Consumer<'a, N>,
        wakeup: &'a Wakeup,
        stats: &'a PipelineStats,
        batch_size: usize,
    ) -> Self {
        Self {
            ring,
            wakeup,
            stats,
            batch: [0; MAX_DRAIN_BATCH],
            batch_size: batch_size.clamp(1, MAX_DRAIN_BATCH),
            next: 0,
            filled: 0,
        }
    }

    /// Forward every buffered byte to `sink`, in order, until the ring is empty.
    ///
    /// If the sink rejects a byte, that byte and the rest of its batch stay
    /// with the consumer and are offered again first on the next drain.
    pub fn drain<K: ByteSink + ?Sized>(&mut self, sink: &mut K) -> Result<usize, PipelineError> {
        self.drain_unless_halted(sink, None)
    }

    fn drain_unless_halted<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
        state: Option<&RunState>,
    ) -> Result<usize, PipelineError> {
        let halted = || state.is_some_and(|s| s.mode() == RunMode::Halted);
        let mut delivered = self.deliver_held(sink)?;

        loop {
            if halted() {
                trace!("halted mid-drain after {delivered} bytes");
                return Ok(delivered);
            }
            let available = self.ring.len();
            if available == 0 {
                break;
            }
            if available > N {
                return Err(PipelineError::ConsistencyViolation(
                    "ring length exceeds its capacity",
                ));
            }

            let popped = self.ring.pop_batch(&mut self.batch[..self.batch_size]);
            if popped == 0 {
                return Err(PipelineError::ConsistencyViolation(
                    "ring reported data but nothing could be popped",
                ));
            }
            self.next = 0;
            self.filled = popped;
            delivered += self.deliver_held(sink)?;
        }

        self.stats.record_drain_pass();
        trace!("drain pass delivered {delivered} bytes");
        Ok(delivered)
    }

    /// Suspend until woken, or until `timeout` if given, then drain.
    /// A timeout still drains.
    pub fn wait_and_drain<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
        timeout: Option<Duration>,
    ) -> Result<usize, PipelineError> {
        match timeout {
            Some(timeout) => {
                if !self.wakeup.wait_timeout(timeout) {
                    trace!("no wake within {timeout:?}, rechecking ring");
                }
            }
            None => self.wakeup.wait(),
        }
        self.drain(sink)
    }

    /// Drain task main loop.
    ///
    /// Returns when `state` leaves `Running`: on `Closing` after a final
    /// drain, on `Halted` at the next batch boundary.
    pub fn run<K: ByteSink + ?Sized>(
        &mut self,
        sink: &mut K,
        state: &RunState,
        wait_timeout: Duration,
    ) -> Result<(), PipelineError> {
        loop {
            let woken = self.wakeup.wait_timeout(wait_timeout);
            match state.mode() {
                RunMode::Halted => return Ok(()),
                RunMode::Closing => {
                    self.drain(sink)?;
                    return Ok(());
                }
                RunMode::Running => {}
            }
            if !woken {
                trace!("no wake within {wait_timeout:?}, rechecking ring");
            }
            self.drain_unless_halted(sink, Some(state))?;
        }
    }

    /// Bytes popped from the ring but still waiting for the sink.
    pub fn held(&self) -> &[u8] {
        &self.batch[self.next..self.filled]
    }

    fn deliver_held<K: ByteSink + ?Sized>(&mut self, sink: &mut K) -> Result<usize, PipelineError> {
        let start = self.next;
        while self.next < self.filled {
            let byte = self.batch[self.next];
            if let Err(source) = sink.accept(byte) {
                self.stats.record_delivered(self.next - start);
                return Err(PipelineError::SinkRejected { byte, source });
            }
            self.next += 1;
        }
        let count = self.next - start;
        self.stats.record_delivered(count);
        Ok(count)
    }
}
