//! Producer/consumer scenarios, single-threaded and threaded

use std::collections::VecDeque;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

use serfeed_core::{
    channel_source, fn_sink, run_pipeline, ByteSink, ByteSource, FaultKind, LineSink, OverflowPolicy,
    PipelineConfig, PipelineError, PipelineStats, RingBuffer, RunMode, RunState, RxConsumer,
    RxOutcome, RxProducer, SharedSink, SinkError, SourceError, Wakeup,
};

/// Sink that stalls on the first byte it sees, long enough for the receive
/// context to fill the ring behind it.
struct StallOnFirst {
    stall: Duration,
    stalled: bool,
    bytes: Vec<u8>,
}

impl StallOnFirst {
    fn new(stall: Duration) -> Self {
        Self {
            stall,
            stalled: false,
            bytes: Vec::new(),
        }
    }
}

impl ByteSink for StallOnFirst {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        if !self.stalled {
            self.stalled = true;
            thread::sleep(self.stall);
        }
        self.bytes.push(byte);
        Ok(())
    }
}

enum SourceEnd {
    IoError,
    Panic,
}

/// Source that hands out a fixed script of bytes and then fails.
struct ScriptedSource {
    bytes: VecDeque<u8>,
    end: SourceEnd,
}

impl ScriptedSource {
    fn new(bytes: &[u8], end: SourceEnd) -> Self {
        Self {
            bytes: bytes.iter().copied().collect(),
            end,
        }
    }
}

impl ByteSource for ScriptedSource {
    fn rx_ready(&mut self) -> Result<bool, SourceError> {
        if !self.bytes.is_empty() {
            return Ok(true);
        }
        match self.end {
            SourceEnd::IoError => Err(SourceError::Io(io::Error::new(io::ErrorKind::Other, "framing error"))),
            SourceEnd::Panic => Ok(true),
        }
    }

    fn getc(&mut self) -> Result<u8, SourceError> {
        match self.bytes.pop_front() {
            Some(b) => Ok(b),
            None => panic!("receive register read with nothing pending"),
        }
    }

    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<(), SourceError> {
        Ok(())
    }
}

fn fast_config(policy: OverflowPolicy, drain_batch: usize) -> PipelineConfig {
    PipelineConfig {
        overflow_policy: policy,
        drain_batch,
        wait_timeout: Duration::from_millis(10),
    }
}

#[test]
fn capacity_four_overflow_then_drain() {
    let mut ring = RingBuffer::<4>::new();
    let (tx, rx) = ring.split();
    let wakeup = Wakeup::new();
    let stats = PipelineStats::new();
    let mut producer = RxProducer::new(tx, &wakeup, &stats, OverflowPolicy::Fatal);
    let mut consumer = RxConsumer::new(rx, &wakeup, &stats, 32);

    for b in *b"abc" {
        assert!(producer.store(b).is_ok());
    }
    assert!(!producer.is_full());
    assert_eq!(producer.store(b'd').unwrap(), RxOutcome::Stored);
    assert!(producer.is_full());

    let err = producer.store(b'e').unwrap_err();
    assert!(matches!(err, PipelineError::BufferOverflow { capacity: 4, byte: b'e' }));
    assert!(err.is_fatal());
    assert!(producer.is_full());

    let mut sink = Vec::new();
    assert_eq!(consumer.drain(&mut sink).unwrap(), 4);
    assert_eq!(sink, b"abcd");
    assert!(!producer.is_full());
    assert_eq!(consumer.drain(&mut sink).unwrap(), 0);
}

#[test]
fn capacity_four_wakeup_is_coalesced() {
    let mut ring = RingBuffer::<4>::new();
    let (tx, rx) = ring.split();
    let wakeup = Wakeup::new();
    let stats = PipelineStats::new();
    let mut producer = RxProducer::new(tx, &wakeup, &stats, OverflowPolicy::Fatal);
    let mut consumer = RxConsumer::new(rx, &wakeup, &stats, 32);

    assert_eq!(producer.store(b'x').unwrap(), RxOutcome::StoredFirst);
    assert_eq!(stats.snapshot().wakeups, 1);
    assert_eq!(producer.store(b'y').unwrap(), RxOutcome::Stored);
    assert_eq!(stats.snapshot().wakeups, 1);

    let mut sink = Vec::new();
    consumer.wait_and_drain(&mut sink, None).unwrap();
    assert_eq!(sink, b"xy");
    assert!(!wakeup.is_pending());

    // The next byte after a consumed wake raises a fresh one.
    producer.store(b'z').unwrap();
    assert_eq!(stats.snapshot().wakeups, 2);
}

#[test]
fn threaded_pipeline_delivers_exact_sequence() {
    const TOTAL: usize = 50_000;
    const IN_FLIGHT: u64 = 256;

    let (tx, source) = channel_source(Duration::from_millis(5));
    let sink = SharedSink::new(Vec::with_capacity(TOTAL));
    let mut writer = sink.clone();
    let config = fast_config(OverflowPolicy::Fatal, 32);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<512>::new();

    let result = thread::scope(|s| {
        let session = s.spawn(|| run_pipeline(&mut ring, source, &mut writer, &config, &state, &stats));

        // Keep fewer bytes in flight than the ring holds, like a line rate
        // the drain task can keep up with.
        let deadline = Instant::now() + Duration::from_secs(30);
        for i in 0..TOTAL {
            while i as u64 - stats.snapshot().delivered >= IN_FLIGHT {
                assert!(Instant::now() < deadline, "drain task stopped making progress");
                thread::yield_now();
            }
            tx.send((i % 251) as u8).unwrap();
        }
        drop(tx);
        session.join().unwrap()
    });

    result.unwrap();
    let delivered = sink.lock();
    assert_eq!(delivered.len(), TOTAL);
    assert!(delivered.iter().enumerate().all(|(i, &b)| b == (i % 251) as u8));

    let snap = stats.snapshot();
    assert_eq!(snap.received, TOTAL as u64);
    assert_eq!(snap.delivered, TOTAL as u64);
    assert_eq!(snap.dropped, 0);
    assert!(snap.wakeups >= 1);
}

#[test]
fn overflow_halts_pipeline() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    for b in *b"abcdef" {
        tx.send(b).unwrap();
    }

    let mut sink = StallOnFirst::new(Duration::from_millis(300));
    let config = fast_config(OverflowPolicy::Fatal, 1);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<4>::new();

    let err = run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap_err();
    assert_eq!(err.kind(), FaultKind::Overflow);
    assert!(matches!(err, PipelineError::BufferOverflow { capacity: 4, .. }));
    assert_eq!(state.mode(), RunMode::Halted);
    drop(tx);
}

#[test]
fn drop_policy_keeps_running_and_counts() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    for b in *b"abcdefgh" {
        tx.send(b).unwrap();
    }
    drop(tx);

    let mut sink = StallOnFirst::new(Duration::from_millis(300));
    let config = fast_config(OverflowPolicy::DropNewest, 1);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<4>::new();

    run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap();

    let snap = stats.snapshot();
    assert_eq!(snap.received, 8);
    assert!(snap.dropped >= 3);
    assert_eq!(snap.delivered + snap.dropped, 8);
    assert_eq!(sink.bytes.len() as u64, snap.delivered);

    // What got through is an in-order subsequence starting at the first byte.
    assert_eq!(sink.bytes[0], b'a');
    assert!(sink.bytes.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn sink_rejection_surfaces_to_caller() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    tx.send(b'!').unwrap();

    let mut sink = fn_sink(|_b| Err(SinkError::Closed));
    let config = fast_config(OverflowPolicy::Fatal, 8);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<8>::new();

    let err = run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::SinkRejected {
            byte: b'!',
            source: SinkError::Closed
        }
    ));
    assert!(!err.is_fatal());
    drop(tx);
}

#[test]
fn close_request_delivers_buffered_bytes() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    let sink = SharedSink::new(Vec::new());
    let mut writer = sink.clone();
    let config = fast_config(OverflowPolicy::Fatal, 32);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<64>::new();

    thread::scope(|s| {
        let session = s.spawn(|| run_pipeline(&mut ring, source, &mut writer, &config, &state, &stats));
        for b in *b"status\n" {
            tx.send(b).unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(10);
        while stats.snapshot().received < 7 {
            assert!(Instant::now() < deadline);
            thread::yield_now();
        }
        state.request_close();
        session.join().unwrap().unwrap();
    });

    assert_eq!(*sink.lock(), b"status\n".to_vec());
}

#[test]
fn source_io_error_halts_pipeline() {
    let source = ScriptedSource::new(b"ok", SourceEnd::IoError);
    let mut sink = Vec::new();
    let config = fast_config(OverflowPolicy::Fatal, 32);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<16>::new();

    let err = run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap_err();
    assert!(matches!(err, PipelineError::Source(SourceError::Io(_))));
    assert_eq!(err.kind(), FaultKind::Source);
    assert!(err.is_fatal());
    assert_eq!(state.mode(), RunMode::Halted);
    assert_eq!(stats.snapshot().received, 2);
}

#[test]
fn receive_panic_is_reported_not_hung() {
    let source = ScriptedSource::new(b"x", SourceEnd::Panic);
    let mut sink = Vec::new();
    let config = fast_config(OverflowPolicy::Fatal, 32);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<16>::new();

    let err = run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap_err();
    assert!(matches!(err, PipelineError::ConsistencyViolation("receive context panicked")));
    assert_eq!(err.kind(), FaultKind::Consistency);
    assert!(err.is_fatal());
    assert_eq!(state.mode(), RunMode::Halted);
}

#[test]
fn sink_panic_stops_receive_context() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    tx.send(b'p').unwrap();

    let mut sink = fn_sink(|_b: u8| -> Result<(), SinkError> { panic!("display detached") });
    let config = fast_config(OverflowPolicy::Fatal, 8);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<8>::new();

    let err = run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap_err();
    assert!(matches!(err, PipelineError::ConsistencyViolation("drain task panicked")));
    assert_eq!(err.kind(), FaultKind::Consistency);
    assert_eq!(state.mode(), RunMode::Halted);
    drop(tx);
}

#[test]
fn normal_close_finishes_sink() {
    let (tx, source) = channel_source(Duration::from_millis(5));
    for b in *b"ready\r\n> " {
        tx.send(b).unwrap();
    }
    drop(tx);

    let mut lines = Vec::new();
    let mut sink = LineSink::new(|line: &[u8]| {
        lines.push(line.to_vec());
        Ok(())
    });
    let config = fast_config(OverflowPolicy::Fatal, 32);
    let state = RunState::new();
    let stats = PipelineStats::new();
    let mut ring = RingBuffer::<16>::new();

    run_pipeline(&mut ring, source, &mut sink, &config, &state, &stats).unwrap();
    drop(sink);
    assert_eq!(lines, vec![b"ready".to_vec(), b"> ".to_vec()]);
}
