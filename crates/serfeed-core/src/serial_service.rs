use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{error, info};
use serialport::SerialPortInfo;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::{PipelineConfig, SerialConfig, DEFAULT_RX_CAPACITY};
use crate::error::{FaultKind, PipelineError};
use crate::pipeline::run_pipeline;
use crate::ring::RingBuffer;
use crate::sink::ByteSink;
use crate::source::{ByteSource, SerialByteSource};
use crate::state::RunState;
use crate::stats::{PipelineStats, StatsSnapshot};

#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port_name: String,
    pub port_type: String,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (port_type, vid, pid, serial_number, manufacturer, product) = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => (
                "USB",
                Some(usb.vid),
                Some(usb.pid),
                usb.serial_number,
                usb.manufacturer,
                usb.product,
            ),
            serialport::SerialPortType::PciPort => ("PCI", None, None, None, None, None),
            serialport::SerialPortType::BluetoothPort => ("Bluetooth", None, None, None, None, None),
            serialport::SerialPortType::Unknown => ("Unknown", None, None, None, None, None),
        };
        Self {
            port_name: info.port_name,
            port_type: port_type.to_string(),
            vid,
            pid,
            serial_number,
            manufacturer,
            product,
        }
    }
}

/// Lifecycle of a receive session. Exactly one of `Fault` or `Closed` ends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Opened(String),
    /// The session stopped on an error; buffered data may have been discarded.
    Fault { kind: FaultKind, message: String },
    /// Normal shutdown; everything received was delivered.
    Closed,
}

impl SessionEvent {
    fn from_result(result: &Result<(), PipelineError>) -> Self {
        match result {
            Ok(()) => SessionEvent::Closed,
            Err(e) => SessionEvent::Fault {
                kind: e.kind(),
                message: error_chain(e),
            },
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A running receive session on its own thread.
///
/// The ring lives on the session thread's stack for the whole session.
pub struct SerialService {
    cfg: SerialConfig,
    state: Arc<RunState>,
    stats: Arc<PipelineStats>,
    rx_evt: Receiver<SessionEvent>,
    handle: Option<JoinHandle<()>>,
}

impl SerialService {
    pub fn list_ports() -> Vec<PortInfo> {
        serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(PortInfo::from)
            .collect()
    }

    /// Open `cfg.port_name` and start delivering received bytes to `sink`.
    ///
    /// Port open failures arrive as a `Fault` event; the returned error only
    /// covers failing to start the session thread.
    pub fn open<K>(cfg: SerialConfig, pipeline: PipelineConfig, sink: K) -> Result<Self, PipelineError>
    where
        K: ByteSink + Send + 'static,
    {
        let port_cfg = cfg.clone();
        Self::spawn(cfg, pipeline, sink, move || SerialByteSource::open(&port_cfg))
    }

    /// Start a session over an arbitrary source, e.g. a [`ChannelSource`](crate::ChannelSource).
    pub fn with_source<S, K>(label: &str, pipeline: PipelineConfig, source: S, sink: K) -> Result<Self, PipelineError>
    where
        S: ByteSource + Send + 'static,
        K: ByteSink + Send + 'static,
    {
        let cfg = SerialConfig {
            port_name: label.to_string(),
            ..Default::default()
        };
        Self::spawn(cfg, pipeline, sink, move || Ok(source))
    }

    fn spawn<S, K, F>(cfg: SerialConfig, pipeline: PipelineConfig, mut sink: K, open: F) -> Result<Self, PipelineError>
    where
        S: ByteSource + Send,
        K: ByteSink + Send + 'static,
        F: FnOnce() -> Result<S, crate::error::SourceError> + Send + 'static,
    {
        let (tx_evt, rx_evt) = unbounded::<SessionEvent>();
        let state = Arc::new(RunState::new());
        let stats = Arc::new(PipelineStats::new());
        let name = cfg.port_name.clone();

        let handle = std::thread::Builder::new()
            .name("serfeed-session".into())
            .spawn({
                let state = Arc::clone(&state);
                let stats = Arc::clone(&stats);
                move || {
                    let result = open().map_err(PipelineError::from).and_then(|source| {
                        info!("receive session on {name} started");
                        let _ = tx_evt.send(SessionEvent::Opened(name.clone()));
                        let mut ring = RingBuffer::<DEFAULT_RX_CAPACITY>::new();
                        run_pipeline(&mut ring, source, &mut sink, &pipeline, &state, &stats)
                    });
                    match &result {
                        Ok(()) => info!("receive session on {name} closed"),
                        Err(e) => error!("receive session on {name} faulted: {}", error_chain(e)),
                    }
                    let _ = tx_evt.send(SessionEvent::from_result(&result));
                }
            })
            .map_err(PipelineError::Spawn)?;

        Ok(Self {
            cfg,
            state,
            stats,
            rx_evt,
            handle: Some(handle),
        })
    }

    /// Request a normal shutdown. Buffered bytes are still delivered.
    pub fn close(&self) {
        self.state.request_close();
    }

    /// Close and wait for the session thread to finish.
    pub fn join(mut self) {
        self.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.rx_evt
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &SerialConfig {
        &self.cfg
    }
}

impl Drop for SerialService {
    fn drop(&mut self) {
        self.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
