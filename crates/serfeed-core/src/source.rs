//! Devices that feed the receive path, and the dispatcher that plays the
//! role of the receive interrupt on a hosted target.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, trace};

use crate::config::SerialConfig;
use crate::error::{PipelineError, SourceError};
use crate::state::RunState;

/// A byte-at-a-time receive device.
pub trait ByteSource {
    /// Wait, up to the source's poll interval, for a byte to become readable.
    fn rx_ready(&mut self) -> Result<bool, SourceError>;

    /// Read exactly one byte. Only meaningful after `rx_ready` returned `true`.
    fn getc(&mut self) -> Result<u8, SourceError>;

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SourceError>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn rx_ready(&mut self) -> Result<bool, SourceError> {
        (**self).rx_ready()
    }

    fn getc(&mut self) -> Result<u8, SourceError> {
        (**self).getc()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SourceError> {
        (**self).set_baud_rate(baud_rate)
    }
}

type RxHandler<'a, S> = Box<dyn FnMut(&mut S) -> Result<(), PipelineError> + 'a>;

/// Receive-ready dispatcher: fires the attached handler once per byte the
/// source reports ready, until the run state leaves `Running` or the handler
/// fails.
pub struct RxInterrupt<'a, S: ByteSource> {
    source: S,
    handler: Option<RxHandler<'a, S>>,
}

impl<'a, S: ByteSource> RxInterrupt<'a, S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            handler: None,
        }
    }

    /// Register the receive handler, replacing any previous one.
    pub fn attach(&mut self, handler: impl FnMut(&mut S) -> Result<(), PipelineError> + 'a) {
        self.handler = Some(Box::new(handler));
    }

    pub fn detach(&mut self) {
        self.handler = None;
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Dispatch until stopped. A source that disconnects ends the run normally.
    pub fn run(&mut self, state: &RunState) -> Result<(), PipelineError> {
        while state.is_running() {
            match self.source.rx_ready() {
                Ok(true) => {}
                Ok(false) => continue,
                Err(SourceError::Disconnected) => {
                    info!("byte source disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            match self.handler.as_mut() {
                Some(handler) => handler(&mut self.source)?,
                None => {
                    let byte = self.source.getc()?;
                    trace!("no rx handler attached, discarding 0x{byte:02X}");
                }
            }
        }
        Ok(())
    }
}

const STAGING_LEN: usize = 256;

/// [`ByteSource`] over an open `serialport` port.
///
/// Bytes come off the port in reads of up to `STAGING_LEN`; each staged
/// byte is then reported ready on its own, like a one-byte receive FIFO.
pub struct SerialByteSource {
    port: Box<dyn serialport::SerialPort>,
    staging: [u8; STAGING_LEN],
    pos: usize,
    len: usize,
}

impl SerialByteSource {
    pub fn open(cfg: &SerialConfig) -> Result<Self, SourceError> {
        let port = serialport::new(&cfg.port_name, cfg.baud_rate)
            .data_bits(cfg.data_bits)
            .parity(cfg.parity)
            .stop_bits(cfg.stop_bits)
            .flow_control(cfg.flow_control)
            .timeout(cfg.read_timeout)
            .open()?;
        debug!("opened {} at {} baud", cfg.port_name, cfg.baud_rate);
        Ok(Self::new(port))
    }

    pub fn new(port: Box<dyn serialport::SerialPort>) -> Self {
        Self {
            port,
            staging: [0; STAGING_LEN],
            pos: 0,
            len: 0,
        }
    }

    pub fn port_name(&self) -> Option<String> {
        self.port.name()
    }
}

impl ByteSource for SerialByteSource {
    fn rx_ready(&mut self) -> Result<bool, SourceError> {
        if self.pos < self.len {
            return Ok(true);
        }
        match self.port.read(&mut self.staging) {
            Ok(0) => Ok(false),
            Ok(n) => {
                self.pos = 0;
                self.len = n;
                Ok(true)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(SourceError::Disconnected),
            Err(e) => Err(e.into()),
        }
    }

    fn getc(&mut self) -> Result<u8, SourceError> {
        if self.pos >= self.len {
            return Err(SourceError::NotReady);
        }
        let byte = self.staging[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SourceError> {
        self.port.set_baud_rate(baud_rate)?;
        Ok(())
    }
}

/// In-memory [`ByteSource`] fed through a channel. Dropping every sender
/// disconnects the source.
pub struct ChannelSource {
    rx: Receiver<u8>,
    poll_interval: Duration,
    next: Option<u8>,
    baud_rate: u32,
}

/// Create a channel source and the sender that feeds it.
pub fn channel_source(poll_interval: Duration) -> (Sender<u8>, ChannelSource) {
    let (tx, rx) = unbounded();
    let source = ChannelSource {
        rx,
        poll_interval,
        next: None,
        baud_rate: crate::config::DEFAULT_BAUD_RATE,
    };
    (tx, source)
}

impl ChannelSource {
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

impl ByteSource for ChannelSource {
    fn rx_ready(&mut self) -> Result<bool, SourceError> {
        if self.next.is_some() {
            return Ok(true);
        }
        match self.rx.recv_timeout(self.poll_interval) {
            Ok(byte) => {
                self.next = Some(byte);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Disconnected),
        }
    }

    fn getc(&mut self) -> Result<u8, SourceError> {
        self.next.take().ok_or(SourceError::NotReady)
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SourceError> {
        self.baud_rate = baud_rate;
        Ok(())
    }
}
