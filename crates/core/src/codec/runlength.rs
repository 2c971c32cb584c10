//! RunLength stream decoder.
//!
//! Length byte 0-127 copies the next n+1 bytes, 129-255 repeats the next
//! byte 257-n times, 128 ends the data. A run cut short by the end of input
//! is dropped.

use crate::error::Result;

pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len() * 2);
    let mut rest = data;

    while let Some((&length, tail)) = rest.split_first() {
        rest = tail;
        match length {
            128 => break,
            0..=127 => {
                let count = length as usize + 1;
                if rest.len() < count {
                    break;
                }
                let (run, tail) = rest.split_at(count);
                result.extend_from_slice(run);
                rest = tail;
            }
            129..=255 => {
                let Some((&byte, tail)) = rest.split_first() else {
                    break;
                };
                result.extend(std::iter::repeat_n(byte, 257 - length as usize));
                rest = tail;
            }
        }
    }

    Ok(result)
}
