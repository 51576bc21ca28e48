//! Downstream consumers of the received byte stream.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::SinkError;

/// Accepts received bytes one at a time, in order.
pub trait ByteSink {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError>;

    /// Called once after the last byte of a normally closed session.
    fn finish(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        self.push(byte);
        Ok(())
    }
}

impl<K: ByteSink + ?Sized> ByteSink for &mut K {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        (**self).accept(byte)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

impl<K: ByteSink + ?Sized> ByteSink for Box<K> {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        (**self).accept(byte)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        (**self).finish()
    }
}

/// Sink backed by a closure.
pub struct FnSink<F>(F);

pub fn fn_sink<F>(f: F) -> FnSink<F>
where
    F: FnMut(u8) -> Result<(), SinkError>,
{
    FnSink(f)
}

impl<F> ByteSink for FnSink<F>
where
    F: FnMut(u8) -> Result<(), SinkError>,
{
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        (self.0)(byte)
    }
}

/// A sink that can be fed by the drain task and inspected from elsewhere.
pub struct SharedSink<K> {
    inner: Arc<Mutex<K>>,
}

impl<K> SharedSink<K> {
    pub fn new(sink: K) -> Self {
        Self {
            inner: Arc::new(Mutex::new(sink)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, K> {
        self.inner.lock()
    }
}

impl<K> Clone for SharedSink<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: ByteSink> ByteSink for SharedSink<K> {
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        self.inner.lock().accept(byte)
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.inner.lock().finish()
    }
}

pub const DEFAULT_MAX_LINE: usize = 1024;

/// Assembles bytes into lines and hands each finished line to a callback.
///
/// `\n`, `\r` and `\r\n` all end a line; the terminator is not included.
/// A line that reaches `max_line` bytes is handed over as is.
pub struct LineSink<F> {
    line: Vec<u8>,
    max_line: usize,
    after_cr: bool,
    on_line: F,
}

impl<F> LineSink<F>
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    pub fn new(on_line: F) -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE, on_line)
    }

    pub fn with_max_line(max_line: usize, on_line: F) -> Self {
        let max_line = max_line.max(1);
        Self {
            line: Vec::with_capacity(max_line),
            max_line,
            after_cr: false,
            on_line,
        }
    }

    /// Bytes received since the last finished line.
    pub fn partial(&self) -> &[u8] {
        &self.line
    }

    /// Hand over an unterminated partial line, if any.
    pub fn flush(&mut self) -> Result<(), SinkError> {
        if self.line.is_empty() {
            return Ok(());
        }
        self.emit()
    }

    fn emit(&mut self) -> Result<(), SinkError> {
        let result = (self.on_line)(&self.line);
        self.line.clear();
        result
    }
}

impl<F> ByteSink for LineSink<F>
where
    F: FnMut(&[u8]) -> Result<(), SinkError>,
{
    fn accept(&mut self, byte: u8) -> Result<(), SinkError> {
        let after_cr = std::mem::replace(&mut self.after_cr, byte == b'\r');
        match byte {
            b'\n' if after_cr => Ok(()),
            b'\r' | b'\n' => self.emit(),
            _ => {
                self.line.push(byte);
                if self.line.len() >= self.max_line {
                    self.emit()
                } else {
                    Ok(())
                }
            }
        }
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        self.flush()
    }
}
