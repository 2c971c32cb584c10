//! RFC 4013 SASLprep, used to normalize revision 6 passwords.
//!
//! Mapping and prohibition follow the RFC 3454 tables. The bidirectional
//! check reads character classes from `unicode-bidi`. Unassigned code points
//! are allowed (the "query" profile), since the reader only compares hashes.

use unicode_bidi::{BidiClass, bidi_class};
use unicode_normalization::UnicodeNormalization;

use crate::error::{PdfError, Result};

/// Table B.1: mapped to nothing.
const fn maps_to_nothing(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{1806}'
            | '\u{180B}'..='\u{180D}'
            | '\u{200B}'..='\u{200D}'
            | '\u{2060}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{FEFF}'
    )
}

/// Table C.1.2: non-ASCII spaces, mapped to U+0020.
const fn is_non_ascii_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200B}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// Tables C.1.2 through C.9.
const fn is_prohibited(c: char) -> bool {
    is_non_ascii_space(c)
        || matches!(
            c,
            // C.2.1 / C.2.2 control characters
            '\u{0000}'..='\u{001F}'
                | '\u{007F}'..='\u{009F}'
                | '\u{06DD}'
                | '\u{070F}'
                | '\u{180E}'
                | '\u{200C}'
                | '\u{200D}'
                | '\u{2028}'
                | '\u{2029}'
                | '\u{2060}'..='\u{2063}'
                | '\u{206A}'..='\u{206F}'
                | '\u{FEFF}'
                | '\u{FFF9}'..='\u{FFFC}'
                | '\u{1D173}'..='\u{1D17A}'
                // C.3 private use
                | '\u{E000}'..='\u{F8FF}'
                | '\u{F0000}'..='\u{FFFFD}'
                | '\u{100000}'..='\u{10FFFD}'
                // C.4 non-character code points
                | '\u{FDD0}'..='\u{FDEF}'
                | '\u{FFFE}'..='\u{FFFF}'
                | '\u{1FFFE}'..='\u{1FFFF}'
                | '\u{2FFFE}'..='\u{2FFFF}'
                | '\u{3FFFE}'..='\u{3FFFF}'
                | '\u{4FFFE}'..='\u{4FFFF}'
                | '\u{5FFFE}'..='\u{5FFFF}'
                | '\u{6FFFE}'..='\u{6FFFF}'
                | '\u{7FFFE}'..='\u{7FFFF}'
                | '\u{8FFFE}'..='\u{8FFFF}'
                | '\u{9FFFE}'..='\u{9FFFF}'
                | '\u{AFFFE}'..='\u{AFFFF}'
                | '\u{BFFFE}'..='\u{BFFFF}'
                | '\u{CFFFE}'..='\u{CFFFF}'
                | '\u{DFFFE}'..='\u{DFFFF}'
                | '\u{EFFFE}'..='\u{EFFFF}'
                | '\u{FFFFE}'..='\u{FFFFF}'
                | '\u{10FFFE}'..='\u{10FFFF}'
                // C.6 inappropriate for plain text
                | '\u{FFFD}'
                // C.7 inappropriate for canonical representation
                | '\u{2FF0}'..='\u{2FFB}'
                // C.8 change display properties
                | '\u{0340}'
                | '\u{0341}'
                | '\u{200E}'
                | '\u{200F}'
                | '\u{202A}'..='\u{202E}'
                // C.9 tagging characters
                | '\u{E0001}'
                | '\u{E0020}'..='\u{E007F}'
        )
}

fn is_rand_al(c: char) -> bool {
    matches!(bidi_class(c), BidiClass::R | BidiClass::AL)
}

fn is_l(c: char) -> bool {
    bidi_class(c) == BidiClass::L
}

/// Prepare `data` with the SASLprep profile: map, NFKC, prohibit, bidi.
pub fn saslprep(data: &str) -> Result<String> {
    let mapped: String = data
        .chars()
        .filter(|&c| !maps_to_nothing(c))
        .map(|c| if is_non_ascii_space(c) { ' ' } else { c })
        .collect();
    let normalized: String = mapped.nfkc().collect();

    if let Some(c) = normalized.chars().find(|&c| is_prohibited(c)) {
        return Err(PdfError::EncryptionError(format!(
            "SASLprep: prohibited character U+{:04X}",
            c as u32
        )));
    }

    if normalized.chars().any(is_rand_al) {
        let first = normalized.chars().next();
        let last = normalized.chars().next_back();
        let bracketed = first.is_some_and(is_rand_al) && last.is_some_and(is_rand_al);
        if !bracketed || normalized.chars().any(is_l) {
            return Err(PdfError::EncryptionError(
                "SASLprep: failed bidirectional check".into(),
            ));
        }
    }

    Ok(normalized)
}
