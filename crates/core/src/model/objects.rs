//! PDF object types.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use super::text::PdfText;
use crate::codec::filters::FilterPipeline;
use crate::error::{PdfError, Result};

/// Dictionary: name (without the leading slash) to value, in source order.
pub type PDFDict = IndexMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type), stored without the slash and with any
    /// `#xx` escapes left as written
    Name(String),
    /// String whose bytes decode as text
    TextString(PdfText),
    /// String holding opaque bytes
    ByteString(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(PDFDict),
    /// Stream (dictionary + binary data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    /// Build a string object, classifying it as text or bytes.
    pub fn string(raw: impl Into<Vec<u8>>) -> Self {
        match PdfText::from_raw(raw.into()) {
            Ok(text) => Self::TextString(text),
            Err(raw) => Self::ByteString(raw),
        }
    }

    /// Build a text string from Rust text.
    pub fn text(text: &str) -> Self {
        Self::TextString(PdfText::new(text))
    }

    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }

    pub const fn reference(objid: u32, genno: u16) -> Self {
        Self::Ref(PDFObjRef::new(objid, genno))
    }

    /// Check if this is a null object
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    /// Get as integer
    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    /// Get as real (float)
    pub const fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("real")),
        }
    }

    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    /// Get as name string
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    /// Raw bytes of either string kind.
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::TextString(t) => Ok(t.as_bytes()),
            Self::ByteString(b) => Ok(b),
            _ => Err(self.type_error("string")),
        }
    }

    /// Decoded text of a text string.
    pub fn as_text(&self) -> Result<&str> {
        match self {
            Self::TextString(t) => Ok(t.as_str()),
            _ => Err(self.type_error("text string")),
        }
    }

    /// Get as array
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    /// Get as dictionary
    pub const fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut PDFDict> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(self.type_error("dict")),
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    /// Get as object reference
    pub const fn as_ref(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(self.type_error("ref")),
        }
    }

    /// Look up a key in a dictionary or a stream's dictionary.
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dict(d) => dict_get(d, key),
            Self::Stream(s) => s.get(key),
            _ => None,
        }
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::TextString(_) => "text string",
            Self::ByteString(_) => "byte string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

impl From<bool> for PDFObject {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PDFObject {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for PDFObject {
    fn from(n: f64) -> Self {
        Self::Real(n)
    }
}

impl From<Vec<PDFObject>> for PDFObject {
    fn from(items: Vec<PDFObject>) -> Self {
        Self::Array(items)
    }
}

impl From<PDFDict> for PDFObject {
    fn from(d: PDFDict) -> Self {
        Self::Dict(d)
    }
}

impl From<PDFStream> for PDFObject {
    fn from(s: PDFStream) -> Self {
        Self::Stream(Box::new(s))
    }
}

impl From<PDFObjRef> for PDFObject {
    fn from(r: PDFObjRef) -> Self {
        Self::Ref(r)
    }
}

/// Replace `#xx` escapes in a name with the bytes they stand for.
pub fn unescape_name(name: &str) -> Cow<'_, str> {
    if !name.contains('#') {
        return Cow::Borrowed(name);
    }
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#'
            && i + 2 < bytes.len()
            && let (Some(h), Some(l)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2]))
        {
            out.push((h << 4) | l);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    match String::from_utf8(out) {
        Ok(s) => Cow::Owned(s),
        Err(e) => Cow::Owned(e.into_bytes().iter().map(|&b| b as char).collect()),
    }
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Dictionary lookup that falls back to comparing `#xx`-unescaped keys.
pub fn dict_get<'d>(dict: &'d PDFDict, key: &str) -> Option<&'d PDFObject> {
    if let Some(v) = dict.get(key) {
        return Some(v);
    }
    dict.iter()
        .find(|(k, _)| k.contains('#') && unescape_name(k) == key)
        .map(|(_, v)| v)
}

/// PDF indirect object reference.
///
/// Only the identifier is stored; resolving goes through the owning
/// `DocumentStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PDFObjRef {
    /// Object ID
    pub objid: u32,
    /// Generation number
    pub genno: u16,
}

impl PDFObjRef {
    /// Create a new object reference.
    pub const fn new(objid: u32, genno: u16) -> Self {
        Self { objid, genno }
    }

    /// Cache key, generation first.
    pub const fn key(&self) -> (u16, u32) {
        (self.genno, self.objid)
    }
}

impl fmt::Display for PDFObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.objid, self.genno)
    }
}

/// PDF Stream - dictionary attributes + binary data.
///
/// Decoded content is computed on first use and kept for the life of the
/// stream.
#[derive(Debug, Clone)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: PDFDict,
    /// Raw (possibly encoded) data
    rawdata: Bytes,
    /// Decoded data (lazily populated)
    decoded: OnceCell<Bytes>,
    /// Object ID (set when stream is part of document)
    pub objid: Option<u32>,
    /// Generation number
    pub genno: Option<u16>,
}

impl PartialEq for PDFStream {
    fn eq(&self, other: &Self) -> bool {
        self.attrs == other.attrs && self.rawdata == other.rawdata
    }
}

impl PDFStream {
    /// Create a new stream.
    pub fn new(attrs: PDFDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
            decoded: OnceCell::new(),
            objid: None,
            genno: None,
        }
    }

    /// Create a stream whose `/Length` matches `data`.
    pub fn from_data(mut attrs: PDFDict, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        attrs.insert("Length".into(), PDFObject::Int(data.len() as i64));
        Self::new(attrs, data)
    }

    /// Set object ID and generation number.
    pub const fn set_objid(&mut self, objid: u32, genno: u16) {
        self.objid = Some(objid);
        self.genno = Some(genno);
    }

    /// Get raw (undecoded) data.
    pub fn get_rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Get raw data as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    /// Replace the raw payload and drop any decoded content.
    pub fn set_rawdata(&mut self, data: impl Into<Bytes>) {
        self.rawdata = data.into();
        self.decoded = OnceCell::new();
    }

    /// Decoded content using the default filter pipeline.
    pub fn decoded_bytes(&self) -> Result<&[u8]> {
        self.decoded_bytes_with(&FilterPipeline::default())
    }

    /// Decoded content using `pipeline`; decoding runs at most once.
    pub fn decoded_bytes_with(&self, pipeline: &FilterPipeline) -> Result<&[u8]> {
        let data = self
            .decoded
            .get_or_try_init(|| pipeline.decode_stream(&self.attrs, &self.rawdata).map(Bytes::from))?;
        Ok(data.as_ref())
    }

    /// Whether decoded content has already been computed.
    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Check if stream contains a key.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        dict_get(&self.attrs, name)
    }

    /// Get attribute, trying multiple names.
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Whether this is an XMP metadata stream.
    pub fn is_metadata(&self) -> bool {
        matches!(self.get("Type"), Some(PDFObject::Name(n)) if n == "Metadata")
    }
}
