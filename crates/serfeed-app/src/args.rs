use anyhow::{anyhow, bail, Context, Result};

use crate::settings::Settings;

pub const USAGE: &str = "\
usage: serfeed [PORT] [options]

options:
  --baud N              line rate (default 115200)
  --hex                 print received lines as hex
  --encoding NAME       auto, utf-8, utf-16, ascii, gbk
  --drop-on-overflow    drop bytes on rx overflow instead of stopping
  --log-level LEVEL     off, error, warn, info, debug, trace
  --list                list serial ports and exit
  --save                store the effective settings
  -h, --help            show this help";

#[derive(Debug, Default, PartialEq)]
pub struct Args {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub hex: bool,
    pub encoding: Option<String>,
    pub drop_on_overflow: bool,
    pub log_level: Option<String>,
    pub list: bool,
    pub save: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut iter = args.into_iter();

        while let Some(arg) = iter.next() {
            let mut value = |name: &str| iter.next().ok_or_else(|| anyhow!("{name} needs a value"));
            match arg.as_str() {
                "--baud" => {
                    let raw = value("--baud")?;
                    parsed.baud_rate = Some(raw.parse().with_context(|| format!("bad baud rate `{raw}`"))?);
                }
                "--encoding" => parsed.encoding = Some(value("--encoding")?),
                "--log-level" => parsed.log_level = Some(value("--log-level")?),
                "--hex" => parsed.hex = true,
                "--drop-on-overflow" => parsed.drop_on_overflow = true,
                "--list" => parsed.list = true,
                "--save" => parsed.save = true,
                "-h" | "--help" => parsed.help = true,
                flag if flag.starts_with('-') => bail!("unknown option `{flag}`"),
                port => {
                    if parsed.port.is_some() {
                        bail!("more than one port given");
                    }
                    parsed.port = Some(port.to_string());
                }
            }
        }
        Ok(parsed)
    }

    /// Overlay the command line on stored settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(port) = &self.port {
            settings.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            settings.baud_rate = baud_rate;
        }
        if let Some(encoding) = &self.encoding {
            settings.encoding = encoding.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        settings.show_hex |= self.hex;
        settings.drop_on_overflow |= self.drop_on_overflow;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_port_and_flags() {
        let args = parse(&["/dev/ttyUSB0", "--baud", "9600", "--hex"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(args.baud_rate, Some(9600));
        assert!(args.hex);
        assert!(!args.list);
    }

    #[test]
    fn test_missing_value_is_error() {
        let err = parse(&["--baud"]).unwrap_err();
        assert!(err.to_string().contains("--baud needs a value"));
    }

    #[test]
    fn test_bad_baud_and_unknown_flag() {
        assert!(parse(&["--baud", "fast"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
        assert!(parse(&["COM1", "COM2"]).is_err());
    }

    #[test]
    fn test_apply_overrides_settings() {
        let mut settings = Settings::default();
        let args = parse(&["COM4", "--encoding", "gbk", "--drop-on-overflow"]).unwrap();
        args.apply(&mut settings);

        assert_eq!(settings.port, "COM4");
        assert_eq!(settings.encoding, "gbk");
        assert!(settings.drop_on_overflow);
        assert_eq!(settings.baud_rate, 115_200);
    }
}
