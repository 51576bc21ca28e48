//! Serial receive pipeline: an interrupt-style receive context pushes bytes
//! into a fixed-capacity SPSC ring, a task drains them into a byte sink.

pub mod config;
pub mod consumer;
pub mod encoding;
pub mod error;
pub mod pipeline;
pub mod producer;
pub mod ring;
pub mod serial_service;
pub mod sink;
pub mod source;
pub mod state;
pub mod stats;
pub mod wakeup;

pub use config::{OverflowPolicy, PipelineConfig, SerialConfig, DEFAULT_RX_CAPACITY};
pub use consumer::{RxConsumer, MAX_DRAIN_BATCH};
pub use encoding::{TextEncoding, UnknownEncoding};
pub use error::{BufferFull, FaultKind, PipelineError, SinkError, SourceError};
pub use pipeline::run_pipeline;
pub use producer::{RxOutcome, RxProducer};
pub use ring::{Consumer, Producer, Pushed, RingBuffer};
pub use serial_service::{PortInfo, SerialService, SessionEvent};
pub use sink::{fn_sink, ByteSink, FnSink, LineSink, SharedSink};
pub use source::{channel_source, ByteSource, ChannelSource, RxInterrupt, SerialByteSource};
pub use state::{RunMode, RunState};
pub use stats::{PipelineStats, StatsSnapshot};
pub use wakeup::Wakeup;
