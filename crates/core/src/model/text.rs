//! Text strings: PDFDocEncoding and the text/byte string classification.
//!
//! A string token does not say whether it holds text or binary data. The
//! reader guesses: a UTF-16BE byte order mark means UTF-16 text, bytes that
//! decode entirely through PDFDocEncoding are text, anything else stays an
//! opaque byte string. This is a heuristic and can classify binary data
//! (for example password hashes) as text; raw bytes are always kept so no
//! information is lost either way.

use std::collections::HashMap;
use std::sync::LazyLock;

/// PDFDocEncoding code points; 0 marks an undefined byte.
#[rustfmt::skip]
const PDF_DOC_ENCODING: [u16; 256] = [
    // 0x00 - 0x17: control codes, only TAB/LF/CR are defined
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0x0009, 0x000A, 0, 0, 0x000D, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    // 0x18 - 0x1F: spacing diacritics
    0x02D8, 0x02C7, 0x02C6, 0x02D9, 0x02DD, 0x02DB, 0x02DA, 0x02DC,
    // 0x20 - 0x7F
    0x0020, 0x0021, 0x0022, 0x0023, 0x0024, 0x0025, 0x0026, 0x0027,
    0x0028, 0x0029, 0x002A, 0x002B, 0x002C, 0x002D, 0x002E, 0x002F,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037,
    0x0038, 0x0039, 0x003A, 0x003B, 0x003C, 0x003D, 0x003E, 0x003F,
    0x0040, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x004A, 0x004B, 0x004C, 0x004D, 0x004E, 0x004F,
    0x0050, 0x0051, 0x0052, 0x0053, 0x0054, 0x0055, 0x0056, 0x0057,
    0x0058, 0x0059, 0x005A, 0x005B, 0x005C, 0x005D, 0x005E, 0x005F,
    0x0060, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067,
    0x0068, 0x0069, 0x006A, 0x006B, 0x006C, 0x006D, 0x006E, 0x006F,
    0x0070, 0x0071, 0x0072, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077,
    0x0078, 0x0079, 0x007A, 0x007B, 0x007C, 0x007D, 0x007E, 0,
    // 0x80 - 0x9F: typographic punctuation and ligatures
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044,
    0x2039, 0x203A, 0x2212, 0x2030, 0x201E, 0x201C, 0x201D, 0x2018,
    0x2019, 0x201A, 0x2122, 0xFB01, 0xFB02, 0x0141, 0x0152, 0x0160,
    0x0178, 0x017D, 0x0131, 0x0142, 0x0153, 0x0161, 0x017E, 0,
    // 0xA0 - 0xFF: Latin-1 except the Euro sign and an undefined 0xAD
    0x20AC, 0x00A1, 0x00A2, 0x00A3, 0x00A4, 0x00A5, 0x00A6, 0x00A7,
    0x00A8, 0x00A9, 0x00AA, 0x00AB, 0x00AC, 0, 0x00AE, 0x00AF,
    0x00B0, 0x00B1, 0x00B2, 0x00B3, 0x00B4, 0x00B5, 0x00B6, 0x00B7,
    0x00B8, 0x00B9, 0x00BA, 0x00BB, 0x00BC, 0x00BD, 0x00BE, 0x00BF,
    0x00C0, 0x00C1, 0x00C2, 0x00C3, 0x00C4, 0x00C5, 0x00C6, 0x00C7,
    0x00C8, 0x00C9, 0x00CA, 0x00CB, 0x00CC, 0x00CD, 0x00CE, 0x00CF,
    0x00D0, 0x00D1, 0x00D2, 0x00D3, 0x00D4, 0x00D5, 0x00D6, 0x00D7,
    0x00D8, 0x00D9, 0x00DA, 0x00DB, 0x00DC, 0x00DD, 0x00DE, 0x00DF,
    0x00E0, 0x00E1, 0x00E2, 0x00E3, 0x00E4, 0x00E5, 0x00E6, 0x00E7,
    0x00E8, 0x00E9, 0x00EA, 0x00EB, 0x00EC, 0x00ED, 0x00EE, 0x00EF,
    0x00F0, 0x00F1, 0x00F2, 0x00F3, 0x00F4, 0x00F5, 0x00F6, 0x00F7,
    0x00F8, 0x00F9, 0x00FA, 0x00FB, 0x00FC, 0x00FD, 0x00FE, 0x00FF,
];

/// Reverse PDFDocEncoding lookup, built once.
static PDF_DOC_REVERSE: LazyLock<HashMap<char, u8>> = LazyLock::new(|| {
    PDF_DOC_ENCODING
        .iter()
        .enumerate()
        .filter(|&(_, &cp)| cp != 0)
        .filter_map(|(byte, &cp)| Some((char::from_u32(u32::from(cp))?, byte as u8)))
        .collect()
});

const UTF16BE_BOM: [u8; 2] = [0xFE, 0xFF];

/// Decode bytes through PDFDocEncoding. `None` if any byte is undefined.
pub fn decode_pdfdoc(bytes: &[u8]) -> Option<String> {
    bytes
        .iter()
        .map(|&b| match PDF_DOC_ENCODING[b as usize] {
            0 => None,
            cp => char::from_u32(u32::from(cp)),
        })
        .collect()
}

/// Encode text through PDFDocEncoding. `None` if a character has no code.
pub fn encode_pdfdoc(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| PDF_DOC_REVERSE.get(&c).copied()).collect()
}

/// Decode a BOM-prefixed UTF-16BE string. `None` on odd length or bad
/// surrogates.
pub fn decode_utf16be(bytes: &[u8]) -> Option<String> {
    let body = bytes.strip_prefix(&UTF16BE_BOM)?;
    if body.len() % 2 != 0 {
        return None;
    }
    let units = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

/// Decode `bytes` as text if they look like text.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if bytes.starts_with(&UTF16BE_BOM) {
        decode_utf16be(bytes)
    } else {
        decode_pdfdoc(bytes)
    }
}

/// A string that decoded as text, with its source bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfText {
    raw: Vec<u8>,
    text: String,
}

impl PdfText {
    /// Classify raw bytes; `Err` hands the bytes back when they are not text.
    pub fn from_raw(raw: Vec<u8>) -> Result<Self, Vec<u8>> {
        match decode_text(&raw) {
            Some(text) => Ok(Self { raw, text }),
            None => Err(raw),
        }
    }

    /// Encode text the way a writer would: PDFDocEncoding when possible,
    /// UTF-16BE with a byte order mark otherwise.
    pub fn new(text: &str) -> Self {
        let raw = encode_pdfdoc(text).unwrap_or_else(|| {
            let mut raw = UTF16BE_BOM.to_vec();
            for unit in text.encode_utf16() {
                raw.extend_from_slice(&unit.to_be_bytes());
            }
            raw
        });
        Self {
            raw,
            text: text.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    pub fn is_utf16(&self) -> bool {
        self.raw.starts_with(&UTF16BE_BOM)
    }
}

impl std::fmt::Display for PdfText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
