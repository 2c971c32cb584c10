//! LZW stream codec using the weezl crate.
//!
//! PDF's LZWDecode is MSB-first with 8-bit literals, codes 256 (clear) and
//! 257 (end of data), and widths growing from 9 to 12 bits one code early
//! (`/EarlyChange 1`). weezl calls the early switch "TIFF size switching".
//! Only the early-change variant is supported.

use weezl::{BitOrder, LzwStatus, decode::Decoder, encode::Encoder};

use crate::error::{PdfError, Result};

/// Decode LZW data. The end-of-data code is required.
pub fn lzwdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
    let mut output = Vec::new();
    let result = decoder.into_vec(&mut output).decode_all(data);
    match result.status {
        Ok(LzwStatus::Done) => Ok(output),
        Ok(_) => Err(PdfError::MalformedStream(
            "LZW data ended without an end-of-data code".into(),
        )),
        Err(e) => Err(PdfError::MalformedStream(format!("LZW: {e}"))),
    }
}

/// Encode data as LZW, terminated by the end-of-data code.
pub fn lzwencode(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = Encoder::with_tiff_size_switch(BitOrder::Msb, 8);
    let mut output = Vec::new();
    let result = encoder.into_vec(&mut output).encode_all(data);
    result
        .status
        .map_err(|e| PdfError::MalformedStream(format!("LZW encode: {e}")))?;
    Ok(output)
}
