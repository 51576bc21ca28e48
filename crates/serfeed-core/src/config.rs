use std::time::Duration;

use crate::consumer::MAX_DRAIN_BATCH;

/// Ring capacity used by [`SerialService`](crate::SerialService) sessions.
pub const DEFAULT_RX_CAPACITY: usize = 512;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: serialport::DataBits,
    pub parity: serialport::Parity,
    pub stop_bits: serialport::StopBits,
    pub flow_control: serialport::FlowControl,
    /// How long one read on the port may block before the receive context
    /// looks at the run state again.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: serialport::DataBits::Eight,
            parity: serialport::Parity::None,
            stop_bits: serialport::StopBits::One,
            flow_control: serialport::FlowControl::None,
            read_timeout: Duration::from_millis(50),
        }
    }
}

/// What the receive context does when the ring is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Stop the session with [`PipelineError::BufferOverflow`](crate::PipelineError).
    #[default]
    Fatal,
    /// Discard the byte, count it, and keep going. Downstream sees a gap.
    DropNewest,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub overflow_policy: OverflowPolicy,
    /// Bytes moved out of the ring per pop; clamped to `1..=MAX_DRAIN_BATCH`.
    pub drain_batch: usize,
    /// Longest the drain task sleeps without a wake before re-checking the ring.
    pub wait_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            overflow_policy: OverflowPolicy::Fatal,
            drain_batch: MAX_DRAIN_BATCH,
            wait_timeout: Duration::from_millis(100),
        }
    }
}

impl PipelineConfig {
    pub fn drain_batch(&self) -> usize {
        self.drain_batch.clamp(1, MAX_DRAIN_BATCH)
    }
}
