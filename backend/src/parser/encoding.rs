//! Encoding detection and decoding.
//!
//! Detection runs once per upload, on the raw bytes, before anything is
//! decoded. Decoding tries the detected encoding strictly and falls back to
//! `windows-1252` once when the bytes are not valid in it.

use encoding_rs::{Encoding, WINDOWS_1252};
use serde::Serialize;

use crate::error::{IngestError, IngestResult};

/// Detection looks at no more than this many leading bytes.
pub const MAX_DETECTION_BYTES: usize = 1024 * 1024;

/// Single-byte superset used when the detected encoding fails.
pub const FALLBACK_ENCODING: &str = "windows-1252";

/// Best-guess encoding of an upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedEncoding {
    /// Label understood by `encoding_rs`.
    pub name: String,
    /// 0.0 to 1.0; 1.0 when a byte-order mark decided it.
    pub confidence: f32,
}

/// Text decoded from an upload.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Encoding actually used.
    pub encoding: String,
    /// True when the fallback encoding had to be used.
    pub used_fallback: bool,
}

/// Detect the encoding of raw bytes using chardet.
///
/// A byte-order mark overrides the statistical guess.
pub fn detect_encoding(bytes: &[u8]) -> IngestResult<DetectedEncoding> {
    if bytes.is_empty() {
        return Err(IngestError::EmptyInput("uploaded file has no bytes".into()));
    }

    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Ok(DetectedEncoding {
            name: encoding.name().to_lowercase(),
            confidence: 1.0,
        });
    }

    let sample = &bytes[..bytes.len().min(MAX_DETECTION_BYTES)];
    let (charset, confidence, _language) = chardet::detect(sample);

    Ok(DetectedEncoding {
        name: normalize_charset(&charset),
        confidence,
    })
}

/// Normalize chardet charset names to `encoding_rs` labels.
fn normalize_charset(charset: &str) -> String {
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with `encoding`, retrying once with [`FALLBACK_ENCODING`].
pub fn decode_content(bytes: &[u8], encoding: &str) -> IngestResult<DecodedText> {
    if let Some(text) = decode_strict(bytes, encoding) {
        return Ok(DecodedText {
            text,
            encoding: encoding.to_string(),
            used_fallback: false,
        });
    }

    if let Some(text) = decode_strict(bytes, FALLBACK_ENCODING) {
        return Ok(DecodedText {
            text,
            encoding: FALLBACK_ENCODING.to_string(),
            used_fallback: true,
        });
    }

    Err(IngestError::Decode {
        encoding: encoding.to_string(),
        fallback: FALLBACK_ENCODING.to_string(),
    })
}

/// Decode without replacement characters; `None` on an unknown label or
/// malformed input.
fn decode_strict(bytes: &[u8], label: &str) -> Option<String> {
    let encoding = Encoding::for_label(label.as_bytes())?;

    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    if encoding == WINDOWS_1252 {
        return Some(WINDOWS_1252.decode_without_bom_handling(body).0.into_owned());
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
}
