//! Minimal stderr backend for the `log` facade.
//!
//! Format: `[elapsed_ms] LEVEL target: message`

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use anyhow::{anyhow, Result};
use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    start: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let elapsed = self.start.elapsed().as_millis();
        let mut err = std::io::stderr().lock();
        let _ = writeln!(
            err,
            "[{elapsed:>8}] {:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

pub fn parse_level(name: &str) -> Result<LevelFilter> {
    name.trim()
        .parse()
        .map_err(|_| anyhow!("unknown log level `{name}`"))
}

pub fn init(level: LevelFilter) -> Result<()> {
    let logger = LOGGER.get_or_init(|| StderrLogger {
        start: Instant::now(),
    });
    log::set_logger(logger).map_err(|e| anyhow!("installing logger: {e}"))?;
    log::set_max_level(level);
    Ok(())
}
