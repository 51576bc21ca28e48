mod args;
mod logger;
mod settings;

use anyhow::{Context, Result};
use log::{info, warn};
use serfeed_core::{
    LineSink, OverflowPolicy, PipelineConfig, SerialConfig, SerialService, SessionEvent, SinkError,
    TextEncoding,
};
use std::io::Write;
use std::process::ExitCode;

use args::{Args, USAGE};
use settings::Settings;

const EXIT_FAULT: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }

    let settings_path = Settings::default_path();
    let mut settings = match &settings_path {
        Some(path) => Settings::load_from(path)?,
        None => Settings::default(),
    };
    args.apply(&mut settings);
    let level = log_level(&args, &settings, std::env::var("SERFEED_LOG").ok());
    logger::init(logger::parse_level(&level)?)?;

    if args.list {
        list_ports();
        return Ok(ExitCode::SUCCESS);
    }

    if args.save {
        let path = settings_path.context("no config directory on this platform")?;
        settings.save_to(&path)?;
        info!("settings saved to {}", path.display());
    }

    if settings.port.is_empty() {
        anyhow::bail!("no port given; run with --list to see available ports");
    }
    receive(&settings)
}

/// `--log-level` wins over `SERFEED_LOG`, which wins over the stored level.
/// The environment never reaches `settings`, so `--save` does not persist it.
fn log_level(args: &Args, settings: &Settings, env: Option<String>) -> String {
    args.log_level
        .clone()
        .or(env)
        .unwrap_or_else(|| settings.log_level.clone())
}

fn list_ports() {
    let ports = SerialService::list_ports();
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for p in ports {
        match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => println!("{} ({:04X}:{:04X}) {}", p.port_name, vid, pid, p.port_type),
            _ => println!("{} {}", p.port_name, p.port_type),
        }
    }
}

fn receive(settings: &Settings) -> Result<ExitCode> {
    let encoding: TextEncoding = settings.encoding.parse()?;
    let show_hex = settings.show_hex;

    let serial = SerialConfig {
        port_name: settings.port.clone(),
        baud_rate: settings.baud_rate,
        ..Default::default()
    };
    let pipeline = PipelineConfig {
        overflow_policy: if settings.drop_on_overflow {
            OverflowPolicy::DropNewest
        } else {
            OverflowPolicy::Fatal
        },
        ..Default::default()
    };

    let sink = LineSink::new(move |line: &[u8]| {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}", format_line(line, show_hex, encoding)).map_err(|_| SinkError::Closed)
    });
    let service = SerialService::open(serial, pipeline, sink)?;

    for event in service.events().iter() {
        match event {
            SessionEvent::Opened(name) => info!("listening on {name} at {} baud", settings.baud_rate),
            SessionEvent::Closed => {
                info!("session closed: {:?}", service.stats());
                return Ok(ExitCode::SUCCESS);
            }
            SessionEvent::Fault { kind, message } => {
                eprintln!("fault ({}): {message}", kind.as_str());
                let stats = service.stats();
                if stats.dropped > 0 {
                    warn!("{} bytes were dropped on overflow", stats.dropped);
                }
                return Ok(ExitCode::from(EXIT_FAULT));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn format_line(line: &[u8], show_hex: bool, encoding: TextEncoding) -> String {
    if show_hex {
        let hex = hex::encode_upper(line);
        let pairs: Vec<&str> = hex
            .as_bytes()
            .chunks(2)
            .filter_map(|pair| std::str::from_utf8(pair).ok())
            .collect();
        pairs.join(" ")
    } else {
        encoding.decode(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_hex() {
        assert_eq!(format_line(b"AT\x0d", true, TextEncoding::Auto), "41 54 0D");
        assert_eq!(format_line(b"", true, TextEncoding::Auto), "");
    }

    #[test]
    fn test_env_log_level_is_not_saved() {
        let mut settings = Settings::default();
        let stored = settings.log_level.clone();
        let args = Args::parse(["COM3".to_string()]).unwrap();
        args.apply(&mut settings);

        assert_eq!(log_level(&args, &settings, Some("trace".into())), "trace");
        assert_eq!(settings.log_level, stored);
        assert_eq!(log_level(&args, &settings, None), stored);

        let args = Args::parse(["--log-level".to_string(), "error".to_string()]).unwrap();
        args.apply(&mut settings);
        assert_eq!(log_level(&args, &settings, Some("trace".into())), "error");
    }

    #[test]
    fn test_format_line_text() {
        assert_eq!(format_line(b"ok", false, TextEncoding::Ascii), "ok");
    }
}
