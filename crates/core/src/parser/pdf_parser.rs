//! PDF object parser.
//!
//! Builds `PDFObject` values straight from a `ByteScanner`. The first
//! significant byte picks the branch: `/` name, `<` hex string or
//! dictionary, `[` array, `t`/`f` boolean, `(` literal string, `n` null,
//! `%` comment, digit or sign a number or an indirect reference.

use std::sync::LazyLock;

use bytes::Bytes;
use regex::bytes::Regex;

use super::scanner::{ByteScanner, find, is_whitespace};
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};

/// `N G R` followed by something that cannot continue a keyword.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(\d+)\s+(R)(?:[^a-zA-Z]|$)").expect("reference regex")
});

/// First byte that cannot be part of a number token.
static NUMBER_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^+\-.0-9]").expect("number regex"));

/// First byte that ends a name.
static NAME_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00\t\n\x0c\r ()<>\[\]{}/%]").expect("name regex")
});

/// Bytes of lookahead used to recognize `N G R`.
const REFERENCE_LOOKAHEAD: usize = 24;

const DEFAULT_MAX_DEPTH: usize = 256;

/// Source of indirect objects the parser needs while parsing, such as an
/// indirect stream `/Length`.
pub trait ObjectResolver {
    fn resolve_reference(&self, reference: &PDFObjRef) -> Result<PDFObject>;
}

pub struct PDFParser<'a> {
    scanner: ByteScanner<'a>,
    /// Shared buffer behind `scanner`, so stream payloads can be sliced
    /// without copying.
    shared: Option<&'a Bytes>,
    diagnostics: &'a Diagnostics,
    resolver: Option<&'a dyn ObjectResolver>,
    max_depth: usize,
    depth: usize,
}

impl<'a> PDFParser<'a> {
    pub fn new(data: &'a [u8], diagnostics: &'a Diagnostics) -> Self {
        Self {
            scanner: ByteScanner::new(data),
            shared: None,
            diagnostics,
            resolver: None,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Parse out of a shared buffer; stream data will borrow from it.
    pub fn from_shared(data: &'a Bytes, diagnostics: &'a Diagnostics) -> Self {
        let mut parser = Self::new(data.as_ref(), diagnostics);
        parser.shared = Some(data);
        parser
    }

    pub fn with_resolver(mut self, resolver: &'a dyn ObjectResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn at(mut self, pos: usize) -> Self {
        self.scanner.set_pos(pos);
        self
    }

    /// Current position in the source.
    pub const fn tell(&self) -> usize {
        self.scanner.tell()
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.scanner.set_pos(pos);
    }

    pub fn scanner(&mut self) -> &mut ByteScanner<'a> {
        &mut self.scanner
    }

    /// Parse the next value.
    pub fn read_value(&mut self) -> Result<PDFObject> {
        loop {
            self.scanner.skip_whitespace();
            let pos = self.scanner.tell();
            let Some(b) = self.scanner.peek_byte() else {
                return Err(PdfError::TruncatedStream(pos));
            };
            return match b {
                b'/' => self.read_name().map(PDFObject::Name),
                b'<' if self.scanner.peek_at(1) == Some(b'<') => self.read_dict_or_stream(),
                b'<' => self.read_hex_string().map(PDFObject::string),
                b'[' => self.read_array(),
                b't' | b'f' => self.read_bool(),
                b'(' => self.read_literal_string().map(PDFObject::string),
                b'n' => {
                    if self.scanner.eat_keyword(b"null") {
                        Ok(PDFObject::Null)
                    } else {
                        Err(self.unexpected_keyword(pos))
                    }
                }
                b'%' => {
                    self.scanner.skip_comment();
                    continue;
                }
                b'0'..=b'9' | b'+' | b'-' | b'.' => self.read_number_or_reference(),
                _ => Err(self.unexpected_keyword(pos)),
            };
        }
    }

    fn unexpected_keyword(&mut self, pos: usize) -> PdfError {
        let token = self.scanner.read_token();
        let token = if token.is_empty() {
            self.scanner.peek(1)
        } else {
            token
        };
        PdfError::unexpected(
            pos,
            format!("unexpected {:?}", String::from_utf8_lossy(token)),
        )
    }

    fn read_bool(&mut self) -> Result<PDFObject> {
        let pos = self.scanner.tell();
        if self.scanner.eat_keyword(b"true") {
            Ok(PDFObject::Bool(true))
        } else if self.scanner.eat_keyword(b"false") {
            Ok(PDFObject::Bool(false))
        } else {
            Err(self.unexpected_keyword(pos))
        }
    }

    /// Read a name after its slash. `#xx` escapes are kept as written.
    pub fn read_name(&mut self) -> Result<String> {
        let pos = self.scanner.tell();
        if self.scanner.advance() != Some(b'/') {
            return Err(PdfError::unexpected(pos, "expected a name"));
        }
        let raw = self.scanner.read_until(&NAME_END, true)?;
        match std::str::from_utf8(raw) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => {
                self.diagnostics.warn(
                    WarningKind::InvalidName,
                    Some(pos),
                    "name is not valid UTF-8, reading it as Latin-1",
                )?;
                Ok(raw.iter().map(|&b| b as char).collect())
            }
        }
    }

    fn read_number_or_reference(&mut self) -> Result<PDFObject> {
        let pos = self.scanner.tell();
        let window = self.scanner.peek(REFERENCE_LOOKAHEAD);
        if let Some(caps) = REFERENCE.captures(window) {
            let objid = parse_ascii::<u32>(&caps[1]);
            let genno = parse_ascii::<u16>(&caps[2]);
            if let (Some(objid), Some(genno)) = (objid, genno) {
                let end = caps.get(3).map_or(0, |m| m.end());
                self.scanner.set_pos(pos + end);
                return Ok(PDFObject::Ref(PDFObjRef::new(objid, genno)));
            }
        }
        self.read_number()
    }

    /// Read an integer or a real.
    pub fn read_number(&mut self) -> Result<PDFObject> {
        let pos = self.scanner.tell();
        let token = self.scanner.read_until(&NUMBER_END, true)?;
        let text = std::str::from_utf8(token).unwrap_or_default();
        if text.is_empty() {
            return Err(PdfError::unexpected(pos, "expected a number"));
        }
        if !text.contains('.')
            && let Ok(n) = text.parse::<i64>()
        {
            return Ok(PDFObject::Int(n));
        }
        text.parse::<f64>()
            .map(PDFObject::Real)
            .map_err(|_| PdfError::unexpected(pos, format!("invalid number {text:?}")))
    }

    /// Read a `( ... )` string, returning its bytes.
    pub fn read_literal_string(&mut self) -> Result<Vec<u8>> {
        let start = self.scanner.tell();
        if self.scanner.advance() != Some(b'(') {
            return Err(PdfError::unexpected(start, "expected '('"));
        }
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let b = self
                .scanner
                .advance()
                .ok_or(PdfError::TruncatedStream(self.scanner.tell()))?;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => self.read_escape(&mut out)?,
                _ => out.push(b),
            }
        }
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let pos = self.scanner.tell();
        let b = self
            .scanner
            .advance()
            .ok_or(PdfError::TruncatedStream(pos))?;
        match b {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'(' | b')' | b'\\' => out.push(b),
            b'0'..=b'7' => {
                let mut value = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.scanner.peek_byte() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.scanner.advance();
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            b'\r' => {
                if self.scanner.peek_byte() == Some(b'\n') {
                    self.scanner.advance();
                }
            }
            b'\n' => {}
            b'/' | b'%' | b'<' | b'>' | b'[' | b']' | b'#' | b'_' | b'&' | b'$' | b' ' => {
                out.push(b);
            }
            other => {
                self.diagnostics.warn(
                    WarningKind::UnknownEscape,
                    Some(pos),
                    format!("unexpected escape \\{}", other as char),
                )?;
                out.push(other);
            }
        }
        Ok(())
    }

    /// Read a `< ... >` string, returning its bytes. An odd final digit is
    /// padded with `0`.
    pub fn read_hex_string(&mut self) -> Result<Vec<u8>> {
        let start = self.scanner.tell();
        if self.scanner.advance() != Some(b'<') {
            return Err(PdfError::unexpected(start, "expected '<'"));
        }
        let mut out = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            let pos = self.scanner.tell();
            let b = self
                .scanner
                .advance()
                .ok_or(PdfError::TruncatedStream(pos))?;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let nibble = (b as char)
                .to_digit(16)
                .ok_or_else(|| PdfError::unexpected(pos, format!("bad hex digit {:?}", b as char)))?
                as u8;
            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
        if let Some(h) = high {
            out.push(h << 4);
        }
        Ok(out)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(PdfError::NestingTooDeep(self.max_depth));
        }
        Ok(())
    }

    fn read_array(&mut self) -> Result<PDFObject> {
        self.scanner.advance();
        self.enter()?;
        let mut items = Vec::new();
        loop {
            self.scanner.skip_whitespace_and_comments();
            match self.scanner.peek_byte() {
                None => return Err(PdfError::TruncatedStream(self.scanner.tell())),
                Some(b']') => {
                    self.scanner.advance();
                    break;
                }
                Some(_) => items.push(self.read_value()?),
            }
        }
        self.depth -= 1;
        Ok(PDFObject::Array(items))
    }

    /// Read a dictionary body after `<<`, through `>>`.
    fn read_dict(&mut self) -> Result<PDFDict> {
        self.scanner.read(2)?;
        self.enter()?;
        let mut dict = PDFDict::new();
        loop {
            self.scanner.skip_whitespace_and_comments();
            let pos = self.scanner.tell();
            match self.scanner.peek_byte() {
                None => return Err(PdfError::TruncatedStream(pos)),
                Some(b'>') if self.scanner.peek_at(1) == Some(b'>') => {
                    self.scanner.read(2)?;
                    break;
                }
                Some(b'/') => {
                    let key = self.read_name()?;
                    let value = self.read_value()?;
                    if dict.contains_key(&key) {
                        self.diagnostics.warn(
                            WarningKind::DuplicateKey,
                            Some(pos),
                            format!("duplicate dictionary key /{key}, keeping the first"),
                        )?;
                    } else {
                        dict.insert(key, value);
                    }
                }
                Some(_) => {
                    return Err(PdfError::unexpected(pos, "expected a name as dictionary key"));
                }
            }
        }
        self.depth -= 1;
        Ok(dict)
    }

    fn read_dict_or_stream(&mut self) -> Result<PDFObject> {
        let dict = self.read_dict()?;
        let after_dict = self.scanner.tell();
        self.scanner.skip_whitespace_and_comments();
        if self.scanner.eat_keyword(b"stream") {
            return self.read_stream_body(dict).map(PDFObject::from);
        }
        self.scanner.set_pos(after_dict);
        Ok(PDFObject::Dict(dict))
    }

    /// Read the payload after the `stream` keyword.
    fn read_stream_body(&mut self, dict: PDFDict) -> Result<PDFStream> {
        let keyword_end = self.scanner.tell();
        while self.scanner.peek_byte() == Some(b' ') {
            self.scanner.advance();
        }
        match self.scanner.peek_byte() {
            Some(b'\n') => {
                self.scanner.advance();
            }
            Some(b'\r') => {
                self.scanner.advance();
                if self.scanner.peek_byte() == Some(b'\n') {
                    self.scanner.advance();
                }
            }
            _ => {
                self.diagnostics.warn(
                    WarningKind::StreamLength,
                    Some(keyword_end),
                    "stream keyword not followed by an end-of-line marker",
                )?;
            }
        }

        let data_start = self.scanner.tell();
        let (data_end, resume) = match self.stream_length(&dict, data_start)? {
            Some(length) => self.check_endstream(data_start, length)?,
            None => self.scan_for_endstream(data_start)?,
        };
        self.scanner.set_pos(resume);

        let data = &self.scanner.data()[data_start..data_end];
        let raw = match self.shared {
            Some(shared) => shared.slice_ref(data),
            None => Bytes::copy_from_slice(data),
        };
        Ok(PDFStream::new(dict, raw))
    }

    /// The declared `/Length` when it is usable, warning otherwise.
    fn stream_length(&mut self, dict: &PDFDict, data_start: usize) -> Result<Option<usize>> {
        let declared = match dict.get("Length") {
            Some(PDFObject::Ref(r)) => match self.resolver {
                Some(resolver) => resolver.resolve_reference(r).ok(),
                None => None,
            },
            other => other.cloned(),
        };
        let available = self.scanner.len() - data_start;
        match declared {
            Some(PDFObject::Int(n)) if n >= 0 && (n as u64) <= available as u64 => Ok(Some(n as usize)),
            other => {
                self.diagnostics.warn(
                    WarningKind::StreamLength,
                    Some(data_start),
                    format!("unusable stream /Length {other:?}, scanning for endstream"),
                )?;
                Ok(None)
            }
        }
    }

    /// Check for `endstream` after `length` bytes, retrying one byte back.
    ///
    /// Returns the end of the payload and the position after `endstream`.
    fn check_endstream(&mut self, data_start: usize, length: usize) -> Result<(usize, usize)> {
        let data_end = data_start + length;
        self.scanner.set_pos(data_end);
        self.scanner.skip_whitespace();
        let p = self.scanner.tell();
        if self.scanner.eat(b"endstream") {
            return Ok((data_end, self.scanner.tell()));
        }
        if p > data_start && self.scanner.data()[p - 1..].starts_with(b"endstream") {
            return Ok((data_end - 1, p - 1 + b"endstream".len()));
        }
        if self.diagnostics.is_strict() {
            return Err(PdfError::MalformedStream(format!(
                "endstream not found after stream at {data_start}"
            )));
        }
        self.diagnostics.warn(
            WarningKind::Endstream,
            Some(p),
            "endstream not found after /Length bytes, scanning for it",
        )?;
        self.scan_for_endstream(data_start)
            .map_err(|_| PdfError::MalformedStream(format!("no endstream for stream at {data_start}")))
    }

    fn scan_for_endstream(&mut self, data_start: usize) -> Result<(usize, usize)> {
        let data = self.scanner.data();
        let found = find(&data[data_start..], b"endstream")
            .ok_or_else(|| PdfError::MalformedStream(format!("no endstream for stream at {data_start}")))?;
        let marker = data_start + found;
        let mut end = marker;
        if end > data_start && data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > data_start && data[end - 1] == b'\r' {
            end -= 1;
        }
        Ok((end, marker + b"endstream".len()))
    }

    /// Read `N G obj` and return the identifier.
    pub fn read_object_header(&mut self) -> Result<(u32, u16)> {
        self.scanner.skip_whitespace_and_comments();
        let pos = self.scanner.tell();
        let bad = || PdfError::unexpected(pos, "expected an object header");
        let objid = self.scanner.read_unsigned().ok_or_else(bad)?;
        if self.scanner.skip_whitespace() == 0 {
            return Err(bad());
        }
        let genno = self.scanner.read_unsigned().ok_or_else(bad)?;
        self.scanner.skip_whitespace_and_comments();
        if !self.scanner.eat_keyword(b"obj") {
            return Err(bad());
        }
        let objid = u32::try_from(objid).map_err(|_| bad())?;
        let genno = u16::try_from(genno).map_err(|_| bad())?;
        Ok((objid, genno))
    }

    /// Read `N G obj <value> endobj`. A missing `endobj` is tolerated.
    pub fn read_indirect_object(&mut self) -> Result<(PDFObjRef, PDFObject)> {
        let (objid, genno) = self.read_object_header()?;
        let mut value = self.read_value()?;
        if let PDFObject::Stream(stream) = &mut value {
            stream.set_objid(objid, genno);
        }
        self.scanner.skip_whitespace_and_comments();
        self.scanner.eat_keyword(b"endobj");
        Ok((PDFObjRef::new(objid, genno), value))
    }
}

fn parse_ascii<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Parse one value from `data` with lenient defaults.
pub fn parse_value(data: &[u8]) -> Result<PDFObject> {
    let diagnostics = Diagnostics::new(false);
    PDFParser::new(data, &diagnostics).read_value()
}
