//! Cross-reference loading.
//!
//! Follows `startxref` and the `/Prev` chain from the newest section to the
//! oldest, merging classic tables and xref streams into one
//! `CrossReferenceTable`. The first entry seen for an object wins, so newer
//! sections are never overwritten by older ones. When the chain cannot be
//! followed, lenient mode rebuilds the index by scanning for `N G obj`
//! headers.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::LazyLock;

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use once_cell::unsync::OnceCell;
use regex::bytes::Regex;
use tracing::debug;

use crate::codec::filters::FilterPipeline;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObject};
use crate::parser::pdf_parser::PDFParser;
use crate::parser::scanner::{ByteScanner, find, rfind};

static REBUILD_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\r\n \t][ \t]*(\d+)[ \t]+(\d+)[ \t]+obj").expect("object header regex")
});

/// `N G obj` not preceded by another digit.
static OBJECT_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)(?:^|[^0-9])(\d+)\s+(\d+)\s+obj").expect("object header regex")
});

static REBUILD_TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\r\n \t][ \t]*trailer[\r\n \t]*(<<)").expect("trailer regex")
});

/// Trailer keys an xref stream contributes to the merged trailer.
const STREAM_TRAILER_KEYS: [&str; 4] = ["Root", "Encrypt", "Info", "ID"];

/// Generation used by free-list heads; never remapped.
const FREE_HEAD_GENERATION: u16 = 65535;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectLocation {
    /// Byte offset of the `N G obj` header.
    Offset(usize),
    /// Index within an object stream.
    InStream { stream_objid: u32, index: usize },
    /// Listed as free; resolves to null.
    Free,
}

/// Merged cross-reference index plus trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceTable {
    offsets: HashMap<(u16, u32), usize>,
    free: HashSet<(u16, u32)>,
    compressed: HashMap<u32, (u32, usize)>,
    trailer: PDFDict,
    is_fallback: bool,
    index_shift: u32,
}

impl CrossReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an uncompressed entry unless the object is already known.
    pub fn insert_offset(&mut self, genno: u16, objid: u32, offset: usize, free: bool) {
        let key = (genno, objid);
        if self.offsets.contains_key(&key) || (genno == 0 && self.compressed.contains_key(&objid)) {
            return;
        }
        self.offsets.insert(key, offset);
        if free {
            self.free.insert(key);
        }
    }

    /// Record an object-stream entry unless the object is already known.
    pub fn insert_compressed(&mut self, objid: u32, stream_objid: u32, index: usize) {
        if self.compressed.contains_key(&objid) || self.offsets.contains_key(&(0, objid)) {
            return;
        }
        self.compressed.insert(objid, (stream_objid, index));
    }

    /// Look an object up: object stream entries (generation 0) first, then
    /// byte offsets.
    pub fn lookup(&self, objid: u32, genno: u16) -> Option<ObjectLocation> {
        if genno == 0
            && let Some(&(stream_objid, index)) = self.compressed.get(&objid)
        {
            return Some(ObjectLocation::InStream {
                stream_objid,
                index,
            });
        }
        let key = (genno, objid);
        let offset = *self.offsets.get(&key)?;
        if self.free.contains(&key) {
            Some(ObjectLocation::Free)
        } else {
            Some(ObjectLocation::Offset(offset))
        }
    }

    pub const fn trailer(&self) -> &PDFDict {
        &self.trailer
    }

    /// Merge trailer keys, keeping values already present.
    pub fn merge_trailer<'a>(&mut self, entries: impl IntoIterator<Item = (&'a String, &'a PDFObject)>) {
        for (key, value) in entries {
            if !self.trailer.contains_key(key) {
                self.trailer.insert(key.clone(), value.clone());
            }
        }
    }

    /// True when the index came from scanning the file rather than from
    /// its xref sections.
    pub const fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// In-use objects as `(objid, genno)`, sorted.
    pub fn object_ids(&self) -> Vec<(u32, u16)> {
        let mut ids: BTreeSet<(u32, u16)> = self
            .offsets
            .keys()
            .filter(|key| !self.free.contains(key))
            .map(|&(genno, objid)| (objid, genno))
            .collect();
        ids.extend(self.compressed.keys().map(|&objid| (objid, 0)));
        ids.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.offsets.len() + self.compressed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear_offsets(&mut self) {
        self.offsets.clear();
        self.free.clear();
    }
}

/// Reads the cross-reference sections of a document.
pub struct XRefLoader<'a> {
    data: &'a Bytes,
    diagnostics: &'a Diagnostics,
    pipeline: &'a FilterPipeline,
    max_depth: usize,
    /// First `N G obj` header per object number, for repairing records.
    headers: OnceCell<HashMap<u32, (usize, u16)>>,
}

impl<'a> XRefLoader<'a> {
    pub fn new(data: &'a Bytes, diagnostics: &'a Diagnostics, pipeline: &'a FilterPipeline) -> Self {
        Self {
            data,
            diagnostics,
            pipeline,
            max_depth: 256,
            headers: OnceCell::new(),
        }
    }

    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn strict(&self) -> bool {
        self.diagnostics.is_strict()
    }

    fn parser_at(&self, pos: usize) -> PDFParser<'a> {
        PDFParser::from_shared(self.data, self.diagnostics)
            .with_max_depth(self.max_depth)
            .at(pos)
    }

    /// Build the merged table for the whole document.
    pub fn load(&self) -> Result<CrossReferenceTable> {
        let mut table = CrossReferenceTable::new();
        let Some(startxref) = self.find_startxref() else {
            if self.strict() {
                return Err(PdfError::NoValidXRef("startxref not found".into()));
            }
            self.diagnostics
                .warn(WarningKind::XrefRebuild, None, "startxref not found, rebuilding xref")?;
            self.rebuild(&mut table)?;
            return Ok(table);
        };

        let issue = self.startxref_issue(startxref);
        if issue != 0 {
            if self.strict() {
                return Err(PdfError::NoValidXRef(format!(
                    "broken xref table (issue {issue})"
                )));
            }
            self.diagnostics.warn(
                WarningKind::XrefResync,
                Some(startxref),
                format!("incorrect startxref pointer ({issue})"),
            )?;
        }

        self.read_chain(startxref, issue, &mut table)?;

        if table.index_shift != 0 && !table.is_fallback {
            self.correct_index_shift(&mut table)?;
        }
        debug!(
            domain = "pdf.xref",
            entries = table.len(),
            fallback = table.is_fallback,
            "xref loaded"
        );
        Ok(table)
    }

    /// Offset named after the last `startxref` keyword.
    fn find_startxref(&self) -> Option<usize> {
        let pos = rfind(self.data, b"startxref")?;
        let mut scanner = ByteScanner::at(self.data, pos + b"startxref".len());
        scanner.skip_whitespace();
        scanner
            .read_unsigned()
            .and_then(|n| usize::try_from(n).ok())
    }

    /// 0 when `startxref` points at `xref` or an `N G obj` header after
    /// whitespace; a small code identifying the problem otherwise.
    fn startxref_issue(&self, startxref: usize) -> u8 {
        let data: &[u8] = self.data;
        if startxref == 0 || startxref >= data.len() {
            return 1;
        }
        if !matches!(data[startxref - 1], b'\r' | b'\n' | b' ' | b'\t') {
            return 1;
        }
        if data[startxref..].starts_with(b"xref") {
            return 0;
        }
        let mut p = startxref;
        while p < data.len() && matches!(data[p], b'0'..=b'9' | b' ' | b'\t') {
            p += 1;
        }
        if p >= data.len() {
            return 2;
        }
        if data[p..].len() < 3 || !data[p..p + 3].eq_ignore_ascii_case(b"obj") {
            return 3;
        }
        0
    }

    /// Follow `/Prev` links iteratively, guarding against loops.
    fn read_chain(&self, startxref: usize, mut issue: u8, table: &mut CrossReferenceTable) -> Result<()> {
        let data: &[u8] = self.data;
        let mut visited = HashSet::new();
        let mut next = Some(startxref);

        while let Some(start) = next {
            if !visited.insert(start) {
                self.diagnostics.warn(
                    WarningKind::XrefPrev,
                    Some(start),
                    "xref /Prev chain loops, stopping",
                )?;
                break;
            }

            let mut pos = start;
            if matches!(data.get(pos), Some(b'\r' | b'\n')) {
                pos += 1;
            }
            match data.get(pos) {
                Some(b'x') => next = self.read_classic(pos, table)?,
                _ if issue != 0 => {
                    match self.rebuild(table) {
                        Ok(()) => break,
                        Err(_) => {
                            issue = 0;
                            visited.remove(&start);
                        }
                    }
                }
                Some(b) if b.is_ascii_digit() => match self.read_stream(pos, table) {
                    Ok(attrs) => {
                        table.merge_trailer(
                            attrs
                                .iter()
                                .filter(|(k, _)| STREAM_TRAILER_KEYS.contains(&k.as_str())),
                        );
                        if let Some(stm) = int_entry(&attrs, "XRefStm") {
                            self.read_hybrid_stream(stm, table)?;
                        }
                        next = int_entry(&attrs, "Prev");
                    }
                    Err(e) if table.trailer.contains_key("Root") => {
                        self.diagnostics.warn(
                            WarningKind::XrefPrev,
                            Some(pos),
                            format!("previous xref stream cannot be read: {e}"),
                        )?;
                        break;
                    }
                    Err(e) => return Err(e),
                },
                _ => next = self.resync(start, table)?,
            }
        }

        if table.is_empty() && !table.is_fallback {
            if self.strict() {
                return Err(PdfError::NoValidXRef("no entries found".into()));
            }
            self.diagnostics
                .warn(WarningKind::XrefRebuild, None, "xref sections are empty, rebuilding")?;
            self.rebuild(table)?;
        }
        Ok(())
    }

    /// Recover from a `startxref`/`/Prev` target that is neither `xref` nor
    /// a digit.
    fn resync(&self, start: usize, table: &mut CrossReferenceTable) -> Result<Option<usize>> {
        let data: &[u8] = self.data;
        if start == 0 {
            if self.strict() {
                return Err(PdfError::NoValidXRef("/Prev 0 in the trailer".into()));
            }
            self.diagnostics.warn(
                WarningKind::XrefPrev,
                Some(0),
                "/Prev 0 in the trailer, assuming there is no previous xref",
            )?;
            return Ok(None);
        }

        let window_start = start.saturating_sub(10);
        let window_end = (window_start + 20).min(data.len());
        if window_start < window_end
            && let Some(loc) = find(&data[window_start..window_end], b"xref")
        {
            self.diagnostics.warn(
                WarningKind::XrefResync,
                Some(start),
                format!("xref found at {} instead", window_start + loc),
            )?;
            return Ok(Some(window_start + loc));
        }

        for look in 0..5 {
            if data.get(start + look).is_some_and(u8::is_ascii_digit) {
                return Ok(Some(start + look));
            }
        }

        if table.trailer.contains_key("Root") && !self.strict() {
            self.diagnostics.warn(
                WarningKind::XrefRebuild,
                Some(start),
                "invalid previous xref, rebuilding",
            )?;
            self.rebuild(table)?;
            return Ok(None);
        }
        Err(PdfError::NoValidXRef(format!(
            "could not find xref table at {start}"
        )))
    }

    /// Parse a classic `xref` table and its trailer. Returns `/Prev`.
    fn read_classic(&self, pos: usize, table: &mut CrossReferenceTable) -> Result<Option<usize>> {
        let data: &[u8] = self.data;
        let mut scanner = ByteScanner::at(data, pos);
        if !scanner.eat(b"xref") {
            return Err(PdfError::MalformedStream(format!("xref table read error at {pos}")));
        }

        let mut section = CrossReferenceTable::new();
        let mut first_in_use: Option<(u32, usize)> = None;
        let mut first_subsection = true;
        loop {
            scanner.skip_whitespace();
            let at = scanner.tell();
            let start = scanner
                .read_unsigned()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| PdfError::unexpected(at, "expected xref subsection start"))?;
            if first_subsection && start != 0 && table.index_shift == 0 {
                section.index_shift = start;
            }
            first_subsection = false;
            scanner.skip_whitespace();
            let at = scanner.tell();
            let count = scanner
                .read_unsigned()
                .ok_or_else(|| PdfError::unexpected(at, "expected xref subsection count"))?;
            scanner.skip_whitespace();

            let mut num = start;
            for _ in 0..count {
                let (offset, genno, free) = self.read_record(&mut scanner, num)?;
                if let Some(offset) = offset {
                    if !free && first_in_use.is_none() && offset > 0 {
                        first_in_use = Some((num, offset));
                    }
                    section.insert_offset(genno, num, offset, free);
                }
                num = num.saturating_add(1);
            }

            scanner.skip_whitespace();
            if scanner.eat(b"trailer") {
                break;
            }
            if scanner.at_end() {
                return Err(PdfError::TruncatedStream(scanner.tell()));
            }
        }

        if let Some((objid, offset)) = first_in_use
            && self.parser_at(offset).read_object_header().is_err()
        {
            if self.strict() {
                return Err(PdfError::NoValidXRef(format!(
                    "xref entry for object {objid} does not point to an object"
                )));
            }
            self.diagnostics.warn(
                WarningKind::XrefRebuild,
                Some(pos),
                format!("xref entry for object {objid} points nowhere, rebuilding"),
            )?;
            self.rebuild(table)?;
            return Ok(None);
        }

        for (&(genno, objid), &offset) in &section.offsets {
            table.insert_offset(genno, objid, offset, section.free.contains(&(genno, objid)));
        }
        if table.index_shift == 0 {
            table.index_shift = section.index_shift;
        }

        let mut parser = self.parser_at(scanner.tell());
        let trailer = match parser.read_value()? {
            PDFObject::Dict(dict) => dict,
            other => {
                return Err(PdfError::TypeError {
                    expected: "trailer dictionary",
                    got: other.type_name(),
                });
            }
        };
        table.merge_trailer(trailer.iter());

        if let Some(stm) = int_entry(&trailer, "XRefStm") {
            self.read_hybrid_stream(stm, table)?;
        }
        Ok(int_entry(&trailer, "Prev"))
    }

    /// Read one fixed-width record, tolerating CRLF and one-byte EOLs.
    /// Returns `(offset, generation, is_free)`; `offset` is `None` when the
    /// record is unusable and no object could be found for it.
    fn read_record(&self, scanner: &mut ByteScanner<'_>, num: u32) -> Result<(Option<usize>, u16, bool)> {
        let mut line = scanner.read(20)?;
        while matches!(line[0], b'\r' | b'\n') {
            scanner.seek_relative(-19)?;
            line = scanner.read(20)?;
        }
        if line[19].is_ascii_digit() || line[19] == b't' {
            scanner.seek_relative(-1)?;
        }

        if let Some((offset, genno)) = parse_record(line) {
            return Ok((Some(offset), genno, line[17] == b'f'));
        }

        match self.object_headers().get(&num) {
            Some(&(offset, genno)) => {
                self.diagnostics.warn(
                    WarningKind::XrefRecord,
                    Some(scanner.tell()),
                    format!("entry {num} in xref table invalid but object found at {offset}"),
                )?;
                Ok((Some(offset), genno, false))
            }
            None => {
                self.diagnostics.warn(
                    WarningKind::XrefRecord,
                    Some(scanner.tell()),
                    format!("entry {num} in xref table invalid, object not found"),
                )?;
                Ok((None, FREE_HEAD_GENERATION, true))
            }
        }
    }

    /// Object headers in the file, scanned once per load. The first header
    /// for a number wins.
    fn object_headers(&self) -> &HashMap<u32, (usize, u16)> {
        self.headers.get_or_init(|| {
            let mut headers = HashMap::new();
            for caps in OBJECT_HEADER.captures_iter(self.data) {
                let (Some(objid), Some(genno), Some(m)) =
                    (parse_num::<u32>(&caps[1]), parse_num::<u16>(&caps[2]), caps.get(1))
                else {
                    continue;
                };
                headers.entry(objid).or_insert((m.start(), genno));
            }
            headers
        })
    }

    /// Load the `/XRefStm` of a hybrid file. Failures are warnings.
    fn read_hybrid_stream(&self, pos: usize, table: &mut CrossReferenceTable) -> Result<()> {
        if let Err(e) = self.read_stream(pos, table) {
            self.diagnostics.warn(
                WarningKind::XrefStream,
                Some(pos),
                format!("xref stream at {pos} cannot be read, some objects may be missing: {e}"),
            )?;
        }
        Ok(())
    }

    /// Parse a cross-reference stream object and merge its entries.
    /// Returns the stream dictionary.
    fn read_stream(&self, pos: usize, table: &mut CrossReferenceTable) -> Result<PDFDict> {
        let mut parser = self.parser_at(pos);
        let (_, obj) = parser.read_indirect_object()?;
        let got = obj.type_name();
        let PDFObject::Stream(stream) = obj else {
            return Err(PdfError::TypeError {
                expected: "xref stream",
                got,
            });
        };
        if stream.get("Type").and_then(|t| t.as_name().ok()) != Some("XRef") {
            return Err(PdfError::MalformedStream(format!(
                "object at {pos} is not an xref stream"
            )));
        }

        let widths: Vec<usize> = stream
            .get("W")
            .ok_or_else(|| PdfError::KeyError("W".into()))?
            .as_array()?
            .iter()
            .map(|w| {
                let w = w.as_int()?;
                usize::try_from(w)
                    .ok()
                    .filter(|&w| w <= 8)
                    .ok_or_else(|| PdfError::MalformedStream(format!("xref field width {w}")))
            })
            .collect::<Result<_>>()?;
        if widths.len() < 3 {
            return Err(PdfError::MalformedStream(format!(
                "xref stream /W has {} entries",
                widths.len()
            )));
        }
        if widths.len() > 3 {
            self.diagnostics.warn(
                WarningKind::XrefStream,
                Some(pos),
                format!("too many xref entry sizes: {widths:?}"),
            )?;
        }

        let size = stream.get("Size").map(PDFObject::as_int).transpose()?.unwrap_or(0);
        let index: Vec<i64> = match stream.get("Index") {
            Some(idx) => idx.as_array()?.iter().map(PDFObject::as_int).collect::<Result<_>>()?,
            None => vec![0, size],
        };

        let decoded = self.pipeline.decode_stream(&stream.attrs, stream.get_rawdata())?;
        let mut cursor = 0usize;
        let mut read_field = |i: usize| -> Option<u64> {
            let width = widths[i];
            if width == 0 {
                return Some(u64::from(i == 0));
            }
            let field = decoded.get(cursor..cursor + width)?;
            cursor += width;
            Some(BigEndian::read_uint(field, width))
        };

        let mut last_end = 0i64;
        'sections: for pair in index.chunks_exact(2) {
            let (start, count) = (pair[0], pair[1]);
            if start < last_end {
                self.diagnostics.warn(
                    WarningKind::XrefStream,
                    Some(pos),
                    format!("xref stream subsection {start} out of order"),
                )?;
            }
            last_end = start.saturating_add(count);
            for num in start..start.saturating_add(count) {
                let (Some(kind), Some(f1), Some(f2)) = (read_field(0), read_field(1), read_field(2))
                else {
                    self.diagnostics.warn(
                        WarningKind::XrefStream,
                        Some(pos),
                        "xref stream data ends before its /Index does",
                    )?;
                    break 'sections;
                };
                for extra in 3..widths.len() {
                    let _ = read_field(extra);
                }
                let Ok(objid) = u32::try_from(num) else {
                    continue;
                };
                match kind {
                    0 => {}
                    1 => {
                        let genno = u16::try_from(f2).unwrap_or(u16::MAX);
                        table.insert_offset(genno, objid, f1 as usize, false);
                    }
                    2 => table.insert_compressed(objid, f1 as u32, f2 as usize),
                    other => {
                        self.diagnostics.warn(
                            WarningKind::XrefStream,
                            Some(pos),
                            format!("unknown xref entry type {other} for object {objid}"),
                        )?;
                    }
                }
            }
        }
        Ok(stream.attrs)
    }

    /// Rebuild the offset index by scanning for object headers. Later
    /// headers and later trailers win.
    fn rebuild(&self, table: &mut CrossReferenceTable) -> Result<()> {
        let data: &[u8] = self.data;
        table.clear_offsets();
        table.is_fallback = true;
        table.index_shift = 0;

        for caps in REBUILD_OBJECT.captures_iter(data) {
            let (Some(objid), Some(genno)) = (parse_num::<u32>(&caps[1]), parse_num::<u16>(&caps[2]))
            else {
                continue;
            };
            let offset = caps.get(1).map_or(0, |m| m.start());
            table.offsets.insert((genno, objid), offset);
        }

        for caps in REBUILD_TRAILER.captures_iter(data) {
            let start = caps.get(1).map_or(0, |m| m.start());
            if let Ok(PDFObject::Dict(trailer)) = self.parser_at(start).read_value() {
                table.trailer.extend(trailer);
            }
        }

        if table.offsets.is_empty() {
            return Err(PdfError::NoValidXRef("no objects found while rebuilding".into()));
        }
        debug!(domain = "pdf.xref", objects = table.offsets.len(), "xref rebuilt");
        Ok(())
    }

    /// Undo a table that numbered its first subsection from N instead of 0.
    fn correct_index_shift(&self, table: &mut CrossReferenceTable) -> Result<()> {
        let shift = table.index_shift;
        let moves = self.shifted_entries(table, shift);
        if moves.is_empty() {
            return Ok(());
        }
        if self.strict() {
            return Err(PdfError::NoValidXRef(format!(
                "xref table not zero-indexed, {} objects are off by {shift}",
                moves.len()
            )));
        }
        for &(genno, objid, pid) in &moves {
            if let Some(offset) = table.offsets.remove(&(genno, objid)) {
                table.offsets.insert((genno, pid), offset);
            }
        }
        self.diagnostics.warn(
            WarningKind::XrefIndexShift,
            None,
            format!("xref table not zero-indexed, renumbered {} objects by -{shift}", moves.len()),
        )?;
        Ok(())
    }

    /// In-use entries whose header carries the number `shift` below the
    /// one the table gives them, as `(genno, objid, real objid)`.
    fn shifted_entries(&self, table: &CrossReferenceTable, shift: u32) -> Vec<(u16, u32, u32)> {
        let mut keys: Vec<(u16, u32)> = table
            .offsets
            .keys()
            .filter(|key| key.0 != FREE_HEAD_GENERATION && !table.free.contains(key))
            .copied()
            .collect();
        keys.sort_unstable();

        keys.into_iter()
            .filter_map(|(genno, objid)| {
                let offset = table.offsets[&(genno, objid)];
                let (pid, _) = self.parser_at(offset).read_object_header().ok()?;
                (objid >= shift && pid == objid - shift).then_some((genno, objid, pid))
            })
            .collect()
    }
}

/// Parse `oooooooooo ggggg` from the first 16 bytes of a record.
fn parse_record(line: &[u8]) -> Option<(usize, u16)> {
    let head = line.get(..16)?;
    let mut parts = head.split(|&b| b == b' ');
    let offset = parse_num::<usize>(parts.next()?)?;
    let genno = parse_num::<u16>(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((offset, genno))
}

fn parse_num<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn int_entry(dict: &PDFDict, key: &str) -> Option<usize> {
    dict.get(key)
        .and_then(|v| v.as_int().ok())
        .and_then(|n| usize::try_from(n).ok())
}

/// True when `data` has `%%EOF` in its last KiB.
pub fn has_eof_marker(data: &[u8]) -> bool {
    let tail = &data[data.len().saturating_sub(1024)..];
    find(tail, b"%%EOF").is_some()
}

/// True when `data` starts with `%PDF-` within its first KiB.
pub fn has_header(data: &[u8]) -> bool {
    find(&data[..data.len().min(1024)], b"%PDF-").is_some()
}
