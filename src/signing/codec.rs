//! Text-safe (base64) encoding used at the engine boundary.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::types::Result;

/// Encode raw bytes as standard base64
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode base64 produced by the engine.
///
/// Line breaks are dropped and missing padding is restored before decoding.
pub fn decode(text: &str) -> Result<Vec<u8>> {
    let mut cleaned: String = text.chars().filter(|c| *c != '\n' && *c != '\r').collect();

    let remainder = cleaned.len() % 4;
    if remainder > 0 {
        cleaned.extend(std::iter::repeat('=').take(4 - remainder));
    }

    Ok(STANDARD.decode(cleaned)?)
}

/// True when the bytes decode as base64 after line-break and padding repair
pub fn is_text_safe(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes)
        .map(|text| !text.trim().is_empty() && decode(text.trim()).is_ok())
        .unwrap_or(false)
}
