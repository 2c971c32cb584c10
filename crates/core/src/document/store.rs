//! Document-level object store.
//!
//! `DocumentStore` owns the input bytes, the merged cross-reference index,
//! the optional encryption engine and a cache of resolved objects keyed by
//! `(generation, objid)`. References inside objects stay as `PDFObject::Ref`
//! and are followed through the store on demand.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use memmap2::Mmap;
use regex::bytes::Regex;
use tracing::debug;

use super::security::{EncryptionEngine, PasswordType};
use super::xref::{CrossReferenceTable, ObjectLocation, XRefLoader, has_eof_marker, has_header};
use crate::codec::filters::FilterPipeline;
use crate::config::ReadOptions;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::error::{PdfError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use crate::parser::pdf_parser::{ObjectResolver, PDFParser};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// References being resolved on this thread, per store.
    static RESOLVING: RefCell<HashSet<(u64, u16, u32)>> = RefCell::new(HashSet::new());
}

struct ResolveGuard {
    key: (u64, u16, u32),
}

impl ResolveGuard {
    fn enter(store_id: u64, reference: &PDFObjRef) -> Result<Self> {
        let key = (store_id, reference.genno, reference.objid);
        let fresh = RESOLVING.with(|set| set.borrow_mut().insert(key));
        if !fresh {
            return Err(PdfError::CircularReference {
                idnum: reference.objid,
                generation: reference.genno,
            });
        }
        Ok(Self { key })
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVING.with(|set| {
            set.borrow_mut().remove(&self.key);
        });
    }
}

type ObjectCache = HashMap<(u16, u32), Arc<PDFObject>>;

/// An opened PDF document.
pub struct DocumentStore {
    id: u64,
    data: Bytes,
    options: ReadOptions,
    diagnostics: Arc<Diagnostics>,
    pipeline: FilterPipeline,
    xref: CrossReferenceTable,
    encryption: Option<EncryptionEngine>,
    /// The `/Encrypt` dictionary's own reference; read in clear.
    encrypt_ref: Option<PDFObjRef>,
    cache: Mutex<ObjectCache>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("len", &self.data.len())
            .field("objects", &self.xref.len())
            .field("encryption", &self.encryption)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Open an in-memory document with lenient defaults.
    pub fn open(data: impl Into<Bytes>) -> Result<Self> {
        Self::open_with_options(data, ReadOptions::default())
    }

    /// Memory-map and open a file.
    pub fn open_file(path: impl AsRef<Path>, options: ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the map is read-only; the file is not expected to change
        // while the document is open.
        let mmap = unsafe { Mmap::map(&file) }?;
        Self::open_with_options(Bytes::from_owner(mmap), options)
    }

    pub fn open_with_options(data: impl Into<Bytes>, options: ReadOptions) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(PdfError::EmptyFile);
        }
        let diagnostics = Arc::new(Diagnostics::new(options.strict));
        if !has_header(&data) {
            diagnostics.warn(WarningKind::MissingHeader, Some(0), "no %PDF- header in the first 1 KiB")?;
        }
        if !has_eof_marker(&data) {
            diagnostics.warn(WarningKind::MissingEof, None, "no %%EOF in the last 1 KiB")?;
        }

        let pipeline = FilterPipeline::new(&options).with_diagnostics(Arc::clone(&diagnostics));
        let xref = XRefLoader::new(&data, &diagnostics, &pipeline)
            .with_max_depth(options.max_depth)
            .load()?;
        debug!(
            domain = "pdf.document",
            objects = xref.len(),
            fallback = xref.is_fallback(),
            "cross-reference index loaded"
        );

        let mut store = Self {
            id: NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed),
            data,
            options,
            diagnostics,
            pipeline,
            xref,
            encryption: None,
            encrypt_ref: None,
            cache: Mutex::new(HashMap::new()),
        };
        store.load_encryption()?;
        Ok(store)
    }

    /// Read `/Encrypt` and `/ID` before any decryption is in place.
    fn load_encryption(&mut self) -> Result<()> {
        let Some(encrypt) = self.xref.trailer().get("Encrypt").cloned() else {
            return Ok(());
        };
        if let PDFObject::Ref(r) = &encrypt {
            self.encrypt_ref = Some(*r);
        }
        let encrypt = self.resolve_value(&encrypt)?;
        let encrypt = encrypt.as_dict()?;

        let id1 = match self.xref.trailer().get("ID").cloned() {
            Some(id) => match self.resolve_value(&id)? {
                PDFObject::Array(items) => match items.first() {
                    Some(first) => self.resolve_value(first)?.as_string()?.to_vec(),
                    None => Vec::new(),
                },
                _ => Vec::new(),
            },
            None => Vec::new(),
        };

        let engine = EncryptionEngine::from_trailer(encrypt, &id1)?
            .with_diagnostics(Arc::clone(&self.diagnostics));
        debug!(
            domain = "pdf.crypt",
            version = engine.version(),
            revision = engine.revision(),
            "document is encrypted"
        );
        self.encryption = Some(engine);
        Ok(())
    }

    /// Try a password. Wrong passwords give `PasswordType::NotDecrypted`.
    ///
    /// Unencrypted documents report `Owner`.
    pub fn decrypt(&mut self, password: impl AsRef<[u8]>) -> Result<PasswordType> {
        match &mut self.encryption {
            Some(engine) => engine.verify(password.as_ref()),
            None => Ok(PasswordType::Owner),
        }
    }

    pub const fn is_encrypted(&self) -> bool {
        self.encryption.is_some()
    }

    pub const fn encryption(&self) -> Option<&EncryptionEngine> {
        self.encryption.as_ref()
    }

    pub const fn trailer(&self) -> &PDFDict {
        self.xref.trailer()
    }

    pub const fn xref(&self) -> &CrossReferenceTable {
        &self.xref
    }

    /// In-use objects in the index, sorted by `(objid, genno)`.
    pub fn object_ids(&self) -> Vec<(u32, u16)> {
        self.xref.object_ids()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub const fn filter_pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub const fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The document catalog (`/Root`).
    pub fn catalog(&self) -> Result<PDFDict> {
        let root = self
            .trailer()
            .get("Root")
            .ok_or_else(|| PdfError::KeyError("Root".into()))?;
        Ok(self.resolve_value(root)?.as_dict()?.clone())
    }

    /// The document information dictionary, if any.
    pub fn info(&self) -> Result<Option<PDFDict>> {
        match self.trailer().get("Info") {
            Some(info) => Ok(self.resolve_value(info)?.as_dict().ok().cloned()),
            None => Ok(None),
        }
    }

    /// Resolve an indirect reference to its value.
    pub fn resolve(&self, reference: &PDFObjRef) -> Result<PDFObject> {
        Ok((*self.resolve_shared(reference)?).clone())
    }

    /// Resolve without cloning the cached object.
    pub fn resolve_shared(&self, reference: &PDFObjRef) -> Result<Arc<PDFObject>> {
        if let Some(obj) = self.lock_cache().get(&reference.key()) {
            return Ok(Arc::clone(obj));
        }
        let _guard = ResolveGuard::enter(self.id, reference)?;
        let obj = Arc::new(self.load_object(reference)?);
        self.lock_cache().insert(reference.key(), Arc::clone(&obj));
        Ok(obj)
    }

    /// Follow references until a direct value is reached.
    pub fn resolve_value(&self, value: &PDFObject) -> Result<PDFObject> {
        let mut current = value.clone();
        let mut seen = HashSet::new();
        while let PDFObject::Ref(r) = current {
            if !seen.insert(r) {
                return Err(PdfError::CircularReference {
                    idnum: r.objid,
                    generation: r.genno,
                });
            }
            current = self.resolve(&r)?;
        }
        Ok(current)
    }

    /// Replace the value cached for `reference`.
    pub fn set_object(&self, reference: PDFObjRef, value: PDFObject) {
        self.lock_cache().insert(reference.key(), Arc::new(value));
    }

    /// Decoded stream content, resolving indirect `/Filter` and
    /// `/DecodeParms` first.
    pub fn stream_data<'s>(&self, stream: &'s PDFStream) -> Result<Cow<'s, [u8]>> {
        let indirect = ["Filter", "DecodeParms"]
            .iter()
            .filter_map(|key| stream.attrs.get(*key))
            .any(contains_ref);
        if !indirect {
            return stream.decoded_bytes_with(&self.pipeline).map(Cow::Borrowed);
        }
        let mut attrs = stream.attrs.clone();
        for key in ["Filter", "DecodeParms"] {
            if let Some(value) = attrs.get_mut(key) {
                *value = self.resolve_deep(value, 0)?;
            }
        }
        self.pipeline
            .decode_stream(&attrs, stream.get_rawdata())
            .map(Cow::Owned)
    }

    fn resolve_deep(&self, value: &PDFObject, depth: usize) -> Result<PDFObject> {
        if depth > self.options.max_depth {
            return Err(PdfError::NestingTooDeep(depth));
        }
        match self.resolve_value(value)? {
            PDFObject::Array(items) => items
                .iter()
                .map(|item| self.resolve_deep(item, depth + 1))
                .collect::<Result<Vec<_>>>()
                .map(PDFObject::Array),
            PDFObject::Dict(dict) => dict
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_deep(v, depth + 1)?)))
                .collect::<Result<PDFDict>>()
                .map(PDFObject::Dict),
            other => Ok(other),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, ObjectCache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn strict(&self) -> bool {
        self.diagnostics.is_strict()
    }

    fn parser_at(&self, pos: usize) -> PDFParser<'_> {
        PDFParser::from_shared(&self.data, &self.diagnostics)
            .with_resolver(self)
            .with_max_depth(self.options.max_depth)
            .at(pos)
    }

    fn load_object(&self, reference: &PDFObjRef) -> Result<PDFObject> {
        match self.xref.lookup(reference.objid, reference.genno) {
            Some(ObjectLocation::InStream {
                stream_objid,
                index,
            }) => self.read_compressed(reference, stream_objid, index),
            Some(ObjectLocation::Offset(offset)) => {
                let obj = self.read_at(reference, offset)?;
                self.decrypt_loaded(obj, reference)
            }
            Some(ObjectLocation::Free) => Ok(PDFObject::Null),
            // Only objects the xref knows about exist.
            None => Err(PdfError::ObjectNotDefined {
                idnum: reference.objid,
                generation: reference.genno,
            }),
        }
    }

    fn decrypt_loaded(&self, obj: PDFObject, reference: &PDFObjRef) -> Result<PDFObject> {
        match &self.encryption {
            Some(engine) if self.encrypt_ref != Some(*reference) => {
                engine.decrypt_object(obj, reference.objid, reference.genno)
            }
            _ => Ok(obj),
        }
    }

    /// Read `N G obj` at `offset`, checking the header against `reference`.
    fn read_at(&self, reference: &PDFObjRef, offset: usize) -> Result<PDFObject> {
        let mut parser = self.parser_at(offset);
        match parser.read_object_header() {
            Ok((objid, genno)) if objid == reference.objid && genno == reference.genno => {}
            Ok((objid, genno)) => {
                self.diagnostics.warn(
                    WarningKind::ObjectHeader,
                    Some(offset),
                    format!("expected {} {} obj, found {objid} {genno} obj", reference.objid, reference.genno),
                )?;
            }
            Err(e) => {
                if self.strict() {
                    return Err(e);
                }
                let found = self.search_header(reference).ok_or(e)?;
                self.diagnostics.warn(
                    WarningKind::ObjectHeader,
                    Some(offset),
                    format!("no object header for {reference} at {offset}; using {found}"),
                )?;
                parser.set_pos(found);
                parser.read_object_header()?;
            }
        }
        let mut value = parser.read_value()?;
        if let PDFObject::Stream(stream) = &mut value {
            stream.set_objid(reference.objid, reference.genno);
        }
        Ok(value)
    }

    /// Offset of the first `N G obj` header for `reference` in the file.
    fn search_header(&self, reference: &PDFObjRef) -> Option<usize> {
        let pattern = format!(r"(?:^|\s){}\s+{}\s+obj", reference.objid, reference.genno);
        let re = Regex::new(&pattern).ok()?;
        let m = re.find(&self.data)?;
        let start = m.start() + m.as_bytes().iter().take_while(|b| b.is_ascii_whitespace()).count();
        Some(start)
    }

    fn read_compressed(&self, reference: &PDFObjRef, stream_objid: u32, index: usize) -> Result<PDFObject> {
        match self.read_from_object_stream(reference, stream_objid, index) {
            Ok(obj) => Ok(obj),
            Err(e @ (PdfError::FileNotDecrypted | PdfError::CircularReference { .. })) => Err(e),
            Err(e) if self.strict() => Err(e),
            Err(e) => {
                self.diagnostics.warn(
                    WarningKind::ObjectStream,
                    None,
                    format!("object {reference} in object stream {stream_objid}: {e}; using null"),
                )?;
                Ok(PDFObject::Null)
            }
        }
    }

    fn read_from_object_stream(
        &self,
        reference: &PDFObjRef,
        stream_objid: u32,
        index: usize,
    ) -> Result<PDFObject> {
        let container = self.resolve_shared(&PDFObjRef::new(stream_objid, 0))?;
        let stream = container.as_stream()?;
        if !matches!(stream.get("Type"), Some(PDFObject::Name(n)) if n == "ObjStm") {
            return Err(PdfError::MalformedStream(format!(
                "object {stream_objid} is not an object stream"
            )));
        }
        let count = self.int_attr(stream, "N")?;
        let first = self.int_attr(stream, "First")?;
        let data = self.stream_data(stream)?;

        let mut parser = PDFParser::new(data.as_ref(), &self.diagnostics)
            .with_resolver(self)
            .with_max_depth(self.options.max_depth);
        for i in 0..count {
            let objnum = parser.read_value()?.as_int()?;
            let offset = parser.read_value()?.as_int()?;
            if objnum != i64::from(reference.objid) {
                continue;
            }
            if self.strict() && i != index {
                return Err(PdfError::MalformedStream(format!(
                    "object {} is at index {i} of object stream {stream_objid}, xref says {index}",
                    reference.objid
                )));
            }
            let pos = i64::try_from(first)
                .ok()
                .and_then(|first| first.checked_add(offset))
                .and_then(|pos| usize::try_from(pos).ok())
                .ok_or_else(|| PdfError::MalformedStream(format!("bad offset {offset} in object stream")))?;
            if pos >= data.len() {
                return Err(PdfError::TruncatedStream(pos));
            }
            parser.set_pos(pos);
            return parser.read_value();
        }
        Err(PdfError::ObjectNotDefined {
            idnum: reference.objid,
            generation: reference.genno,
        })
    }

    fn int_attr(&self, stream: &PDFStream, key: &str) -> Result<usize> {
        let value = stream
            .get(key)
            .ok_or_else(|| PdfError::KeyError(key.to_string()))?;
        let n = self.resolve_value(value)?.as_int()?;
        usize::try_from(n).map_err(|_| PdfError::MalformedStream(format!("negative /{key} {n}")))
    }
}

impl ObjectResolver for DocumentStore {
    fn resolve_reference(&self, reference: &PDFObjRef) -> Result<PDFObject> {
        self.resolve(reference)
    }
}

fn contains_ref(value: &PDFObject) -> bool {
    match value {
        PDFObject::Ref(_) => true,
        PDFObject::Array(items) => items.iter().any(contains_ref),
        PDFObject::Dict(dict) => dict.values().any(contains_ref),
        _ => false,
    }
}

