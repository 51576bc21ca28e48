use thiserror::Error;

/// Returned by a push into a full ring. Carries the rejected byte; the ring is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer full, byte 0x{0:02X} rejected")]
pub struct BufferFull(pub u8);

/// Failure reported by a downstream [`ByteSink`](crate::ByteSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink closed")]
    Closed,
    #[error("{0}")]
    Rejected(String),
}

/// Failure of the device feeding the receive path.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Serial(#[from] serialport::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("byte source disconnected")]
    Disconnected,
    #[error("no byte ready")]
    NotReady,
}

/// Everything that can stop the receive pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Receive overrun. Bytes after this point cannot be trusted.
    #[error("rx overflow: all {capacity} slots in use, byte 0x{byte:02X} lost")]
    BufferOverflow { capacity: usize, byte: u8 },

    /// The ring or the wake signal was observed in a state single-producer/single-consumer use cannot produce.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(&'static str),

    #[error("sink rejected byte 0x{byte:02X}")]
    SinkRejected {
        byte: u8,
        #[source]
        source: SinkError,
    },

    /// The sink failed to hand over what it still held at close.
    #[error("sink failed to finish")]
    SinkFinish(#[source] SinkError),

    #[error("byte source failed")]
    Source(#[from] SourceError),

    #[error("failed to start receive context")]
    Spawn(#[source] std::io::Error),
}

/// Coarse classification used when reporting a stopped session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Overflow,
    Consistency,
    SinkRejected,
    Source,
    Spawn,
}

impl FaultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Overflow => "overflow",
            FaultKind::Consistency => "consistency",
            FaultKind::SinkRejected => "sink-rejected",
            FaultKind::Source => "source",
            FaultKind::Spawn => "spawn",
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> FaultKind {
        match self {
            PipelineError::BufferOverflow { .. } => FaultKind::Overflow,
            PipelineError::ConsistencyViolation(_) => FaultKind::Consistency,
            PipelineError::SinkRejected { .. } | PipelineError::SinkFinish(_) => FaultKind::SinkRejected,
            PipelineError::Source(_) => FaultKind::Source,
            PipelineError::Spawn(_) => FaultKind::Spawn,
        }
    }

    /// Fatal errors leave the byte stream in an unknown state; the session must not continue.
    /// A sink rejection is surfaced to the caller, who owns that policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::SinkRejected { .. } | PipelineError::SinkFinish(_))
    }
}
