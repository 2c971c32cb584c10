//! ASCIIHex stream codec.

use crate::error::{PdfError, Result};
use crate::parser::scanner::is_whitespace;

const fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode hex digit pairs up to `>`, ignoring whitespace. An odd trailing
/// digit is completed with `0`.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for (pos, &byte) in data.iter().enumerate() {
        if byte == b'>' {
            break;
        }
        if is_whitespace(byte) {
            continue;
        }
        let nibble = hex_nibble(byte).ok_or_else(|| {
            PdfError::MalformedStream(format!(
                "invalid ASCIIHex digit {:?} at {pos}",
                byte as char
            ))
        })?;
        match pending.take() {
            Some(high) => result.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }
    Ok(result)
}

/// Encode as lowercase hex terminated by `>`.
pub fn asciihexencode(data: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut out = Vec::with_capacity(data.len() * 2 + 1);
    for &b in data {
        out.push(DIGITS[(b >> 4) as usize]);
        out.push(DIGITS[(b & 0x0f) as usize]);
    }
    out.push(b'>');
    out
}
