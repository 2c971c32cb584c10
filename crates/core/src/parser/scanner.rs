//! Byte cursor over a PDF source.
//!
//! `ByteScanner` only moves a position around a borrowed buffer; all
//! interpretation of the bytes lives in the parser and xref loader.

use regex::bytes::Regex;

use crate::error::{PdfError, Result};

/// Check if byte is PDF whitespace
#[inline]
pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

/// Check if byte is a PDF delimiter character
#[inline]
pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Whitespace or delimiter: the end of a bare token.
#[inline]
pub const fn is_token_end(b: u8) -> bool {
    is_whitespace(b) || is_delimiter(b)
}

#[derive(Debug, Clone)]
pub struct ByteScanner<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteScanner<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current position in the source
    pub const fn tell(&self) -> usize {
        self.pos
    }

    /// Set current position; clamped to the end of the source.
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Unread bytes from the cursor on.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Current byte without advancing.
    #[inline]
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Byte at `offset` past the cursor without advancing.
    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Up to `n` bytes from the cursor; shorter at end of input.
    pub fn peek(&self, n: usize) -> &'a [u8] {
        let rest = self.remaining();
        &rest[..n.min(rest.len())]
    }

    /// Consume one byte.
    #[inline]
    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    /// Consume exactly `n` bytes or fail with `TruncatedStream`.
    pub fn read(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(PdfError::TruncatedStream(self.pos))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Consume one byte or fail with `TruncatedStream`.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.advance().ok_or(PdfError::TruncatedStream(self.pos))
    }

    /// Move the cursor by a signed delta.
    pub fn seek_relative(&mut self, delta: isize) -> Result<()> {
        let target = self
            .pos
            .checked_add_signed(delta)
            .filter(|&p| p <= self.data.len())
            .ok_or_else(|| {
                PdfError::unexpected(self.pos, format!("seek by {delta} leaves the buffer"))
            })?;
        self.pos = target;
        Ok(())
    }

    /// Skip whitespace, returning how many bytes were skipped.
    pub fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if !is_whitespace(b) {
                break;
            }
            self.pos += 1;
        }
        self.pos - start
    }

    /// Skip a `%` comment through its end-of-line marker.
    ///
    /// No-op unless the cursor is on `%`.
    pub fn skip_comment(&mut self) {
        if self.peek_byte() != Some(b'%') {
            return;
        }
        while let Some(b) = self.advance() {
            match b {
                b'\n' => return,
                b'\r' => {
                    if self.peek_byte() == Some(b'\n') {
                        self.pos += 1;
                    }
                    return;
                }
                _ => {}
            }
        }
    }

    /// Skip any run of whitespace and comments.
    pub fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.skip_whitespace();
            if self.peek_byte() == Some(b'%') {
                self.skip_comment();
            } else {
                return;
            }
        }
    }

    /// Read up to the first match of `delimiter`, leaving the cursor on it.
    ///
    /// Without a match, returns the rest of the input when `allow_eof` is
    /// set and fails with `TruncatedStream` otherwise.
    pub fn read_until(&mut self, delimiter: &Regex, allow_eof: bool) -> Result<&'a [u8]> {
        let rest = self.remaining();
        match delimiter.find(rest) {
            Some(m) => {
                self.pos += m.start();
                Ok(&rest[..m.start()])
            }
            None if allow_eof => {
                self.pos = self.data.len();
                Ok(rest)
            }
            None => Err(PdfError::TruncatedStream(self.data.len())),
        }
    }

    /// Read a bare token: everything up to whitespace or a delimiter.
    pub fn read_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if is_token_end(b) {
                break;
            }
            self.pos += 1;
        }
        &self.data[start..self.pos]
    }

    /// Read to the end of the current line; the EOL marker is consumed but
    /// not returned.
    pub fn read_line(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            match b {
                b'\n' => {
                    let line = &self.data[start..self.pos];
                    self.pos += 1;
                    return line;
                }
                b'\r' => {
                    let line = &self.data[start..self.pos];
                    self.pos += 1;
                    if self.peek_byte() == Some(b'\n') {
                        self.pos += 1;
                    }
                    return line;
                }
                _ => self.pos += 1,
            }
        }
        &self.data[start..]
    }

    /// Consume `keyword` if the input continues with it.
    pub fn eat(&mut self, keyword: &[u8]) -> bool {
        if self.remaining().starts_with(keyword) {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Like `eat` but also requires a token boundary after the keyword.
    pub fn eat_keyword(&mut self, keyword: &[u8]) -> bool {
        let rest = self.remaining();
        if rest.starts_with(keyword)
            && rest.get(keyword.len()).is_none_or(|&b| is_token_end(b))
        {
            self.pos += keyword.len();
            true
        } else {
            false
        }
    }

    /// Parse an unsigned decimal integer at the cursor.
    pub fn read_unsigned(&mut self) -> Option<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(b) = self.peek_byte().filter(u8::is_ascii_digit) {
            value = value.checked_mul(10)?.checked_add(u64::from(b - b'0'))?;
            self.pos += 1;
        }
        if self.pos == start { None } else { Some(value) }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
