//! Binary encoders for PDF objects.
//!
//! Output is meant to parse back to an equal value, not to match any
//! particular producer byte for byte.

use std::io::{self, Write};

use super::objects::{PDFObject, PDFStream};
use crate::parser::scanner::is_token_end;

/// Serialize an object to a fresh buffer.
pub fn serialize(obj: &PDFObject) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = write_object(&mut out, obj);
    out
}

/// Write an object in PDF syntax.
pub fn write_object<W: Write>(out: &mut W, obj: &PDFObject) -> io::Result<()> {
    match obj {
        PDFObject::Null => out.write_all(b"null"),
        PDFObject::Bool(b) => out.write_all(if *b { b"true" } else { b"false" }),
        PDFObject::Int(n) => write!(out, "{n}"),
        PDFObject::Real(r) => out.write_all(format_real(*r).as_bytes()),
        PDFObject::Name(name) => write_name(out, name),
        PDFObject::TextString(text) => write_literal_string(out, text.as_bytes()),
        PDFObject::ByteString(bytes) => write_hex_string(out, bytes),
        PDFObject::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b" ")?;
                }
                write_object(out, item)?;
            }
            out.write_all(b"]")
        }
        PDFObject::Dict(dict) => write_dict(out, dict.iter()),
        PDFObject::Stream(stream) => write_stream(out, stream),
        PDFObject::Ref(r) => write!(out, "{} {} R", r.objid, r.genno),
    }
}

fn write_dict<'a, W: Write>(
    out: &mut W,
    entries: impl Iterator<Item = (&'a String, &'a PDFObject)>,
) -> io::Result<()> {
    out.write_all(b"<<")?;
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.write_all(b" ")?;
        }
        write_name(out, key)?;
        out.write_all(b" ")?;
        write_object(out, value)?;
    }
    out.write_all(b">>")
}

/// Stream dictionary with `/Length` set to the payload size, then the payload.
fn write_stream<W: Write>(out: &mut W, stream: &PDFStream) -> io::Result<()> {
    let data = stream.get_rawdata();
    let length = PDFObject::Int(data.len() as i64);
    let length_key = "Length".to_string();
    let entries = stream
        .attrs
        .iter()
        .filter(|(k, _)| k.as_str() != "Length")
        .chain(std::iter::once((&length_key, &length)));
    write_dict(out, entries)?;
    out.write_all(b"\nstream\n")?;
    out.write_all(data)?;
    out.write_all(b"\nendstream")
}

/// Reals print with at most five decimals and no trailing zeros, but keep
/// one fractional digit so they read back as reals.
pub fn format_real(value: f64) -> String {
    if !value.is_finite() {
        return "0.0".to_string();
    }
    let mut s = format!("{value:.5}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.push('0');
    }
    if s == "-0.0" {
        s.remove(0);
    }
    s
}

/// `#xx`-escape bytes that cannot appear bare in a name.
///
/// Parsed names keep their `#xx` escapes, so a `#` is written as is and an
/// existing escape survives unchanged. The written name therefore matches
/// the input after [`unescape_name`], not byte for byte: `A B` comes back
/// from the parser as `A#20B`. Compare keys through [`dict_get`].
///
/// [`unescape_name`]: crate::model::objects::unescape_name
/// [`dict_get`]: crate::model::objects::dict_get
fn write_name<W: Write>(out: &mut W, name: &str) -> io::Result<()> {
    out.write_all(b"/")?;
    for &b in name.as_bytes() {
        if b < 0x21 || b > 0x7e || (is_token_end(b) && b != b'#') {
            write!(out, "#{b:02x}")?;
        } else {
            out.write_all(&[b])?;
        }
    }
    Ok(())
}

fn write_literal_string<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(b"(")?;
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => out.write_all(&[b'\\', b])?,
            0x20..=0x7e => out.write_all(&[b])?,
            _ => write!(out, "\\{b:03o}")?,
        }
    }
    out.write_all(b")")
}

fn write_hex_string<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(b"<")?;
    for &b in bytes {
        write!(out, "{b:02x}")?;
    }
    out.write_all(b">")
}

/// Write `objid genno obj ... endobj`.
pub fn write_indirect<W: Write>(
    out: &mut W,
    objid: u32,
    genno: u16,
    obj: &PDFObject,
) -> io::Result<()> {
    writeln!(out, "{objid} {genno} obj")?;
    write_object(out, obj)?;
    out.write_all(b"\nendobj\n")
}
