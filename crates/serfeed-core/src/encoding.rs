use encoding_rs::{GBK, UTF_16LE, UTF_8};
use thiserror::Error;

/// Text encoding used to render received lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Auto,
    Utf8,
    Utf16,
    Ascii,
    Gbk,
}

#[derive(Debug, Error)]
#[error("unknown text encoding `{0}`")]
pub struct UnknownEncoding(pub String);

impl std::str::FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "AUTO" => Ok(Self::Auto),
            "UTF-8" | "UTF8" => Ok(Self::Utf8),
            "UTF-16" | "UTF16" | "UTF-16LE" => Ok(Self::Utf16),
            "ASCII" => Ok(Self::Ascii),
            "GBK" | "GB2312" => Ok(Self::Gbk),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Ascii => "ascii",
            Self::Gbk => "gbk",
        }
    }

    /// Decode a received line. Undecodable input is replaced, never rejected.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Auto => detect_and_decode(bytes),
            Self::Utf8 => UTF_8.decode(bytes).0.into_owned(),
            Self::Utf16 => UTF_16LE.decode(bytes).0.into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Gbk => GBK.decode(bytes).0.into_owned(),
        }
    }
}

fn detect_and_decode(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true).decode(bytes).0.into_owned()
}
