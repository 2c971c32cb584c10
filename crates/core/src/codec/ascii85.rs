//! ASCII85 stream codec.
//!
//! Handles `z` groups, optional `<~`/`~>` markers, whitespace, and a
//! missing end marker.

use crate::error::{PdfError, Result};
use crate::parser::scanner::is_whitespace;

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &c| acc * 85 + u64::from(c - b'!'));
    u32::try_from(value).map_err(|_| {
        PdfError::MalformedStream(format!(
            "ASCII85 group {:?} overflows 32 bits",
            String::from_utf8_lossy(group)
        ))
    })
}

/// Decode ASCII85 data.
///
/// A final group of n < 5 characters is padded with `u` and yields n - 1
/// bytes.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(end) => &data[..end],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() * 4 / 5 + 4);
    let mut group = [0u8; 5];
    let mut filled = 0;

    for (pos, &byte) in data.iter().enumerate() {
        match byte {
            b'z' if filled == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte;
                filled += 1;
                if filled == 5 {
                    result.extend_from_slice(&group_value(&group)?.to_be_bytes());
                    filled = 0;
                }
            }
            b if is_whitespace(b) => {}
            _ => {
                return Err(PdfError::MalformedStream(format!(
                    "invalid ASCII85 character {:?} at {pos}",
                    byte as char
                )));
            }
        }
    }

    if filled > 0 {
        group[filled..].fill(b'u');
        let bytes = group_value(&group)?.to_be_bytes();
        result.extend_from_slice(&bytes[..filled - 1]);
    }

    Ok(result)
}

/// Encode data as ASCII85 with `z` for zero groups and a `~>` terminator.
pub fn ascii85encode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() * 5 / 4 + 7);

    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let value = u32::from_be_bytes(word);

        if chunk.len() == 4 && value == 0 {
            result.push(b'z');
            continue;
        }

        let mut encoded = [0u8; 5];
        let mut v = value;
        for slot in encoded.iter_mut().rev() {
            *slot = (v % 85) as u8 + b'!';
            v /= 85;
        }
        result.extend_from_slice(&encoded[..chunk.len() + 1]);
    }

    result.extend_from_slice(b"~>");
    result
}
