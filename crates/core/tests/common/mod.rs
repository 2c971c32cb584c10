//! Helpers for building small PDF files in tests.
//!
//! Offsets are tracked as objects are appended so xref sections always
//! point at the right bytes.

#![allow(dead_code)]

use std::collections::BTreeMap;

/// One entry of a cross-reference stream.
#[derive(Debug, Clone, Copy)]
pub enum XrefEntry {
    Free,
    Offset(usize),
    InStream { stream_objid: u32, index: u16 },
    /// The xref stream's own offset.
    Here,
}

pub struct PdfBuilder {
    buf: Vec<u8>,
    offsets: BTreeMap<u32, (u16, usize)>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_header(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n")
    }

    pub fn with_header(header: &[u8]) -> Self {
        Self {
            buf: header.to_vec(),
            offsets: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn offset_of(&self, objid: u32) -> usize {
        self.offsets[&objid].1
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append `objid 0 obj <body> endobj`.
    pub fn object(&mut self, objid: u32, body: &str) -> &mut Self {
        self.object_bytes(objid, 0, body.as_bytes())
    }

    pub fn object_bytes(&mut self, objid: u32, genno: u16, body: &[u8]) -> &mut Self {
        self.offsets.insert(objid, (genno, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{objid} {genno} obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        self
    }

    /// Append a stream object; `/Length` is added to `dict_entries`.
    pub fn stream(&mut self, objid: u32, dict_entries: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< {dict_entries} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object_bytes(objid, 0, &body)
    }

    /// Append an object stream holding `(objid, body)` pairs, Flate-encoded.
    pub fn object_stream(&mut self, objid: u32, objects: &[(u32, &str)]) -> &mut Self {
        let mut header = String::new();
        let mut bodies = String::new();
        for (id, body) in objects {
            header.push_str(&format!("{id} {} ", bodies.len()));
            bodies.push_str(body);
            bodies.push(' ');
        }
        let first = header.len();
        let plain = format!("{header}{bodies}");
        let encoded = quire_core::codec::flateencode(plain.as_bytes()).unwrap();
        self.stream(
            objid,
            &format!(
                "/Type /ObjStm /N {} /First {first} /Filter /FlateDecode",
                objects.len()
            ),
            &encoded,
        )
    }

    /// Write a classic xref section for every object so far (missing numbers
    /// become free entries) and return its offset.
    pub fn xref(&mut self, trailer: &str) -> usize {
        let max = self.offsets.keys().next_back().copied().unwrap_or(0);
        let ids: Vec<u32> = (0..=max).collect();
        self.xref_for(&ids, trailer)
    }

    /// Write a classic xref section covering only `ids`.
    pub fn xref_for(&mut self, ids: &[u32], trailer: &str) -> usize {
        let start = self.buf.len();
        self.buf.extend_from_slice(b"xref\n");
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        let mut runs: Vec<Vec<u32>> = Vec::new();
        for id in ids {
            match runs.last_mut() {
                Some(run) if run.last() == Some(&(id - 1)) => run.push(id),
                _ => runs.push(vec![id]),
            }
        }
        for run in runs {
            self.buf
                .extend_from_slice(format!("{} {}\n", run[0], run.len()).as_bytes());
            for id in run {
                let record = match self.offsets.get(&id) {
                    Some(&(genno, offset)) => format!("{offset:010} {genno:05} n\r\n"),
                    None if id == 0 => "0000000000 65535 f\r\n".to_string(),
                    None => "0000000000 00001 f\r\n".to_string(),
                };
                self.buf.extend_from_slice(record.as_bytes());
            }
        }
        self.buf
            .extend_from_slice(format!("trailer\n{trailer}\n").as_bytes());
        start
    }

    /// Write an xref stream with `/W [1 4 2]` as object `objid`.
    pub fn xref_stream(&mut self, objid: u32, entries: &[XrefEntry], extra: &str) -> usize {
        let start = self.buf.len();
        let mut data = Vec::new();
        for entry in entries {
            let (kind, field2, field3): (u8, u32, u16) = match *entry {
                XrefEntry::Free => (0, 0, 0),
                XrefEntry::Offset(offset) => (1, offset as u32, 0),
                XrefEntry::InStream {
                    stream_objid,
                    index,
                } => (2, stream_objid, index),
                XrefEntry::Here => (1, start as u32, 0),
            };
            data.push(kind);
            data.extend_from_slice(&field2.to_be_bytes());
            data.extend_from_slice(&field3.to_be_bytes());
        }
        self.stream(
            objid,
            &format!(
                "/Type /XRef /Size {} /W [1 4 2] {extra}",
                entries.len()
            ),
            &data,
        );
        start
    }

    pub fn startxref(&mut self, offset: usize) -> &mut Self {
        self.buf
            .extend_from_slice(format!("startxref\n{offset}\n%%EOF\n").as_bytes());
        self
    }

    /// Classic xref, trailer, `startxref`, `%%EOF`.
    pub fn finish(mut self, trailer: &str) -> Vec<u8> {
        let xref = self.xref(trailer);
        self.startxref(xref);
        self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// The two-object document: a catalog and an empty page tree.
pub fn minimal_pdf() -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>");
    pdf.finish("<< /Size 3 /Root 1 0 R >>")
}

pub fn hex(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}
