//! Wiring of source, ring, wake signal and sink into two running contexts.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use log::{debug, error};

use crate::config::PipelineConfig;
use crate::consumer::RxConsumer;
use crate::error::PipelineError;
use crate::producer::RxProducer;
use crate::ring::RingBuffer;
use crate::sink::ByteSink;
use crate::source::{ByteSource, RxInterrupt};
use crate::state::{RunMode, RunState};
use crate::stats::PipelineStats;
use crate::wakeup::Wakeup;

/// Run one receive session over `ring` until `state` leaves `Running` or a
/// fatal error stops it.
///
/// The receive context runs on a scoped thread named `serfeed-rx`; the drain
/// task runs on the calling thread. A receive-side failure halts the drain
/// task without delivering further bytes; a source that disconnects closes
/// the session normally and what is buffered is still delivered.
///
/// A panic on either side halts the session and is returned as a
/// consistency violation. On a normal close the sink is finished after the
/// last drain, so it can hand over anything it still holds.
///
/// The first error to stop the session is returned.
pub fn run_pipeline<S, K, const N: usize>(
    ring: &mut RingBuffer<N>,
    source: S,
    sink: &mut K,
    config: &PipelineConfig,
    state: &RunState,
    stats: &PipelineStats,
) -> Result<(), PipelineError>
where
    S: ByteSource + Send,
    K: ByteSink + ?Sized,
{
    let wakeup = Wakeup::new();
    let (producer, consumer) = ring.split();

    thread::scope(|scope| {
        let wakeup = &wakeup;
        let policy = config.overflow_policy;

        let rx = thread::Builder::new()
            .name("serfeed-rx".into())
            .spawn_scoped(scope, move || {
                let mut producer = RxProducer::new(producer, wakeup, stats, policy);
                let mut irq = RxInterrupt::new(source);
                irq.attach(move |src: &mut S| producer.on_rx_ready(src).map(drop));

                let result = panic::catch_unwind(AssertUnwindSafe(|| irq.run(state)))
                    .unwrap_or(Err(PipelineError::ConsistencyViolation("receive context panicked")));
                match &result {
                    Ok(()) => state.request_close(),
                    Err(e) => {
                        error!("receive context stopped: {e}");
                        state.halt();
                    }
                }
                wakeup.notify();
                result
            })
            .map_err(PipelineError::Spawn)?;

        let mut consumer = RxConsumer::new(consumer, wakeup, stats, config.drain_batch());
        let drained = panic::catch_unwind(AssertUnwindSafe(|| consumer.run(sink, state, config.wait_timeout)))
            .unwrap_or(Err(PipelineError::ConsistencyViolation("drain task panicked")));
        if let Err(e) = &drained {
            error!("drain task stopped: {e}");
            state.halt();
        }

        let received = rx.join().unwrap_or(Err(PipelineError::ConsistencyViolation(
            "receive context panicked",
        )));

        // The receive context is gone; pick up whatever it stored after the last pass.
        let drained = match drained {
            Ok(()) if state.mode() != RunMode::Halted => consumer
                .drain(sink)
                .and_then(|_| sink.finish().map_err(PipelineError::SinkFinish)),
            other => other,
        };
        debug!("receive session finished: {:?}", stats.snapshot());
        received.and(drained)
    })
}
