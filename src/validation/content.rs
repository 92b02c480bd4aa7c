//! Content sniffing and decoding of submitted values.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;

static BASE64_STANDARD_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9+/]*={0,2}$").ok());

static BASE64_URL_SAFE_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]*={0,2}$").ok());

fn matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(value))
}

/// What a byte slice looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// UTF-8 text without binary control characters
    Text,
    /// Unrecognised bytes (`application/octet-stream`)
    Binary,
    /// A recognised non-text format
    Detected(&'static str),
}

impl ContentKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Text => "text/plain; charset=utf-8",
            Self::Binary => "application/octet-stream",
            Self::Detected(mime) => mime,
        }
    }
}

/// Control bytes that never appear in text
fn is_binary_byte(b: &u8) -> bool {
    matches!(*b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

/// A lone NUL byte is never accepted, even as binary
pub fn is_null_byte(bytes: &[u8]) -> bool {
    bytes.len() == 1 && bytes[0] == 0
}

pub fn sniff(bytes: &[u8]) -> ContentKind {
    if !bytes.iter().any(is_binary_byte) && std::str::from_utf8(bytes).is_ok() {
        return ContentKind::Text;
    }
    match infer::get(bytes) {
        Some(kind) => ContentKind::Detected(kind.mime_type()),
        None => ContentKind::Binary,
    }
}

/// Padded base64 in either alphabet. `=` is only allowed as trailing
/// padding; anything else is not base64.
pub fn decode_base64(value: &str) -> Option<Vec<u8>> {
    if matches(&BASE64_STANDARD_REGEX, value) {
        if let Ok(decoded) = STANDARD.decode(value) {
            return Some(decoded);
        }
    }
    if matches(&BASE64_URL_SAFE_REGEX, value) {
        return URL_SAFE.decode(value).ok();
    }
    None
}

/// Try base32, base32hex, hex and base64 in that order, returning the
/// bytes from the first decoder that accepts `value`.
pub fn decode_any(value: &str) -> Option<Vec<u8>> {
    let bytes = value.as_bytes();
    data_encoding::BASE32
        .decode(bytes)
        .ok()
        .or_else(|| data_encoding::BASE32HEX.decode(bytes).ok())
        .or_else(|| hex::decode(value).ok())
        .or_else(|| decode_base64(value))
}
