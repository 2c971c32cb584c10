//! Tests for `DocumentStore`.

mod common;

use std::borrow::Cow;

use common::{PdfBuilder, XrefEntry, minimal_pdf};
use quire_core::codec::flateencode;
use quire_core::parser::parse_value;
use quire_core::{
    DocumentStore, EncryptionEngine, PDFObjRef, PDFObject, PasswordType, PdfError, ReadOptions,
    WarningKind,
};

const DOCID: &str = "651a94feeb7868d312a97b377270860e";
const RC4_128_O: &str = "d048d1529e535d1884cd3856367b184b4a90df01e637d16eca065baf4e64900b";
const RC4_128_U: &str = "093412363b9d327c7ac50144c7c755f100000000000000000000000000000000";

fn strict(data: Vec<u8>) -> quire_core::Result<DocumentStore> {
    DocumentStore::open_with_options(data, ReadOptions::strict())
}

fn r(objid: u32) -> PDFObjRef {
    PDFObjRef::new(objid, 0)
}

#[test]
fn test_minimal_document() {
    let doc = strict(minimal_pdf()).unwrap();
    assert!(!doc.is_encrypted());
    assert!(doc.diagnostics().is_empty());
    assert_eq!(doc.object_ids(), vec![(1, 0), (2, 0)]);

    let catalog = doc.catalog().unwrap();
    assert_eq!(catalog.get("Type"), Some(&PDFObject::name("Catalog")));
    let pages = doc.resolve_value(&catalog["Pages"]).unwrap();
    assert_eq!(pages.get("Count"), Some(&PDFObject::Int(0)));
    assert_eq!(doc.info().unwrap(), None);
}

#[test]
fn test_unencrypted_decrypt_reports_owner() {
    let mut doc = DocumentStore::open(minimal_pdf()).unwrap();
    assert_eq!(doc.decrypt("anything").unwrap(), PasswordType::Owner);
}

#[test]
fn test_info_dictionary() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Title (Quarterly report) /Producer 3 0 R >>")
        .object(3, "(quire)");
    let doc = strict(pdf.finish("<< /Size 4 /Root 1 0 R /Info 2 0 R >>")).unwrap();

    let info = doc.info().unwrap().unwrap();
    assert_eq!(info["Title"].as_text().unwrap(), "Quarterly report");
    // References inside values are left for the caller to follow.
    assert_eq!(info["Producer"], PDFObject::reference(3, 0));
    assert_eq!(doc.resolve_value(&info["Producer"]).unwrap().as_text().unwrap(), "quire");
}

#[test]
fn test_empty_input() {
    assert!(matches!(DocumentStore::open(Vec::new()), Err(PdfError::EmptyFile)));
}

#[test]
fn test_missing_header_and_eof() {
    let mut pdf = PdfBuilder::with_header(b"garbage before the body\n");
    pdf.object(1, "<< /Type /Catalog >>");
    let at = pdf.xref("<< /Size 2 /Root 1 0 R >>");
    pdf.raw(format!("startxref\n{at}\n").as_bytes());
    let data = pdf.into_bytes();

    let doc = DocumentStore::open(data.clone()).unwrap();
    assert!(doc.diagnostics().contains(WarningKind::MissingHeader));
    assert!(doc.diagnostics().contains(WarningKind::MissingEof));
    assert!(doc.catalog().is_ok());

    assert!(matches!(strict(data), Err(PdfError::Strict(_))));
}

#[test]
fn test_free_entries_resolve_to_null() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>").object(3, "(unlisted)");
    let doc = strict(pdf.finish("<< /Size 4 /Root 1 0 R >>")).unwrap();
    // Object 2 was never written, so the table lists it as free with
    // generation 1.
    assert_eq!(doc.resolve(&PDFObjRef::new(2, 1)).unwrap(), PDFObject::Null);
    assert!(matches!(doc.resolve(&r(2)), Err(PdfError::ObjectNotDefined { .. })));
}

#[test]
fn test_incremental_update_wins() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>").object(2, "(old)");
    let base = pdf.xref("<< /Size 3 /Root 1 0 R >>");
    pdf.startxref(base);
    pdf.object(2, "(new)");
    let update = pdf.xref_for(&[2], &format!("<< /Size 3 /Root 1 0 R /Prev {base} >>"));
    pdf.startxref(update);

    let doc = strict(pdf.into_bytes()).unwrap();
    assert_eq!(doc.resolve(&r(2)).unwrap().as_text().unwrap(), "new");
}

#[test]
fn test_object_streams() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object_stream(3, &[(4, "(first)"), (5, "<< /A 4 0 R /B [1 2] >>")]);
    let entries = [
        XrefEntry::Free,
        XrefEntry::Offset(pdf.offset_of(1)),
        XrefEntry::Offset(pdf.offset_of(2)),
        XrefEntry::Offset(pdf.offset_of(3)),
        XrefEntry::InStream { stream_objid: 3, index: 0 },
        XrefEntry::InStream { stream_objid: 3, index: 1 },
        XrefEntry::Here,
    ];
    let at = pdf.xref_stream(6, &entries, "/Root 1 0 R");
    pdf.startxref(at);

    let doc = strict(pdf.into_bytes()).unwrap();
    let five = doc.resolve(&r(5)).unwrap();
    assert_eq!(five.get("B"), Some(&PDFObject::Array(vec![PDFObject::Int(1), PDFObject::Int(2)])));
    let a = doc.resolve_value(five.get("A").unwrap()).unwrap();
    assert_eq!(a.as_text().unwrap(), "first");
    assert_eq!(doc.catalog().unwrap().get("Pages"), Some(&PDFObject::reference(2, 0)));
}

#[test]
fn test_object_stream_containing_itself() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .object_stream(2, &[(3, "(inside)")]);
    let entries = [
        XrefEntry::Free,
        XrefEntry::Offset(pdf.offset_of(1)),
        XrefEntry::InStream { stream_objid: 2, index: 0 },
        XrefEntry::InStream { stream_objid: 2, index: 0 },
        XrefEntry::Here,
    ];
    let at = pdf.xref_stream(4, &entries, "/Root 1 0 R");
    pdf.startxref(at);

    let doc = DocumentStore::open(pdf.into_bytes()).unwrap();
    assert!(matches!(
        doc.resolve(&r(3)),
        Err(PdfError::CircularReference { idnum: 2, generation: 0 })
    ));
}

#[test]
fn test_circular_reference_chain() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "2 0 R").object(2, "1 0 R");
    let doc = DocumentStore::open(pdf.finish("<< /Size 3 /Root 1 0 R >>")).unwrap();

    // One hop is fine.
    assert_eq!(doc.resolve(&r(1)).unwrap(), PDFObject::reference(2, 0));
    assert!(matches!(
        doc.resolve_value(&PDFObject::reference(1, 0)),
        Err(PdfError::CircularReference { .. })
    ));
}

#[test]
fn test_indirect_length() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Length 3 0 R >>\nstream\nabcdef\nendstream")
        .object(3, "6");
    let doc = strict(pdf.finish("<< /Size 4 /Root 1 0 R >>")).unwrap();
    let stream = doc.resolve(&r(2)).unwrap();
    assert_eq!(stream.as_stream().unwrap().get_rawdata(), b"abcdef");
    assert!(doc.diagnostics().is_empty());
}

#[test]
fn test_length_referring_to_its_own_stream() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Length 2 0 R >>\nstream\nabc\nendstream");
    let doc = DocumentStore::open(pdf.finish("<< /Size 3 /Root 1 0 R >>")).unwrap();

    let stream = doc.resolve(&r(2)).unwrap();
    assert_eq!(stream.as_stream().unwrap().get_rawdata(), b"abc");
    assert!(doc.diagnostics().contains(WarningKind::StreamLength));
}

#[test]
fn test_object_missing_from_xref() {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .object(2, "(listed)")
        .object(7, "(hidden)")
        .stream(3, "", b"9 0 obj (ghost) endobj");
    let at = pdf.xref_for(&[0, 1, 2, 3], "<< /Size 4 /Root 1 0 R >>");
    pdf.startxref(at);
    let data = pdf.into_bytes();

    let doc = DocumentStore::open(data.clone()).unwrap();
    assert_eq!(doc.resolve(&r(2)).unwrap().as_text().unwrap(), "listed");
    assert!(matches!(
        doc.resolve(&r(7)),
        Err(PdfError::ObjectNotDefined { idnum: 7, generation: 0 })
    ));
    // Header text inside a stream payload is not an object.
    assert!(matches!(
        doc.resolve(&r(9)),
        Err(PdfError::ObjectNotDefined { idnum: 9, generation: 0 })
    ));
    assert!(!doc.diagnostics().contains(WarningKind::ObjectHeader));

    let doc = strict(data).unwrap();
    assert!(matches!(
        doc.resolve(&r(7)),
        Err(PdfError::ObjectNotDefined { idnum: 7, generation: 0 })
    ));
}

#[test]
fn test_set_object_replaces_cached_value() {
    let doc = DocumentStore::open(minimal_pdf()).unwrap();
    let pages = doc.resolve_shared(&r(2)).unwrap();
    assert!(pages.as_dict().is_ok());

    doc.set_object(r(2), PDFObject::Int(9));
    assert_eq!(doc.resolve(&r(2)).unwrap(), PDFObject::Int(9));
    // Earlier handles keep the old value.
    assert!(pages.as_dict().is_ok());
}

#[test]
fn test_stream_data_with_indirect_filter() {
    let encoded = flateencode(b"decoded through an indirect filter").unwrap();
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .stream(2, "/Filter 3 0 R", &encoded)
        .object(3, "[/FlateDecode]");
    let doc = strict(pdf.finish("<< /Size 4 /Root 1 0 R >>")).unwrap();

    let obj = doc.resolve(&r(2)).unwrap();
    let stream = obj.as_stream().unwrap();
    let data = doc.stream_data(stream).unwrap();
    assert!(matches!(data, Cow::Owned(_)));
    assert_eq!(data.as_ref(), b"decoded through an indirect filter");
}

#[test]
fn test_stream_data_with_direct_filter() {
    let encoded = flateencode(b"plain").unwrap();
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog >>")
        .stream(2, "/Filter /FlateDecode", &encoded);
    let doc = strict(pdf.finish("<< /Size 3 /Root 1 0 R >>")).unwrap();

    let obj = doc.resolve(&r(2)).unwrap();
    assert_eq!(doc.stream_data(obj.as_stream().unwrap()).unwrap().as_ref(), b"plain");
}

#[test]
fn test_resolve_from_several_threads() {
    let doc = DocumentStore::open(minimal_pdf()).unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    assert!(doc.catalog().is_ok());
                    assert!(doc.resolve(&r(2)).unwrap().as_dict().is_ok());
                }
            });
        }
    });
}

fn encrypt_dict() -> String {
    format!("<< /Filter /Standard /V 2 /R 3 /Length 128 /P -4 /O <{RC4_128_O}> /U <{RC4_128_U}> >>")
}

fn encrypted_pdf(stream_body: Option<&[u8]>) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    pdf.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [] /Count 0 >>")
        .object(3, &encrypt_dict())
        .object(4, "<643f0bb6386f5e70da45d6>");
    if let Some(body) = stream_body {
        pdf.stream(5, "", body);
    }
    pdf.finish(&format!(
        "<< /Size 6 /Root 1 0 R /Encrypt 3 0 R /ID [<{DOCID}> <{DOCID}>] >>"
    ))
}

#[test]
fn test_encrypted_document() {
    let mut doc = strict(encrypted_pdf(None)).unwrap();
    assert!(doc.is_encrypted());
    assert!(matches!(doc.catalog(), Err(PdfError::FileNotDecrypted)));

    assert_eq!(doc.decrypt("wrong").unwrap(), PasswordType::NotDecrypted);
    assert_eq!(doc.decrypt("baz").unwrap(), PasswordType::User);
    assert_eq!(doc.resolve(&r(4)).unwrap().as_text().unwrap(), "Secret text");
    assert!(doc.catalog().is_ok());

    // The /Encrypt dictionary itself is stored in clear.
    let encrypt = doc.resolve(&r(3)).unwrap();
    assert_eq!(encrypt.get("R"), Some(&PDFObject::Int(3)));

    let engine = doc.encryption().unwrap();
    assert_eq!(engine.key_length(), 16);
    assert_eq!(engine.permissions(), -4);
}

#[test]
fn test_encrypted_document_owner_password() {
    let mut doc = strict(encrypted_pdf(None)).unwrap();
    assert_eq!(doc.decrypt("foo").unwrap(), PasswordType::Owner);
    assert_eq!(doc.resolve(&r(4)).unwrap().as_text().unwrap(), "Secret text");
}

#[test]
fn test_encrypted_stream() {
    let PDFObject::Dict(encrypt) = parse_value(encrypt_dict().as_bytes()).unwrap() else {
        panic!("encryption dictionary should parse to a dict");
    };
    let mut engine = EncryptionEngine::from_trailer(&encrypt, &common::hex(DOCID)).unwrap();
    assert_eq!(engine.verify(b"baz").unwrap(), PasswordType::User);
    let cipher = engine.encrypt_bytes(b"stream payload", 5, 0, None).unwrap();

    let mut doc = strict(encrypted_pdf(Some(&cipher))).unwrap();
    doc.decrypt("baz").unwrap();
    let obj = doc.resolve(&r(5)).unwrap();
    assert_eq!(obj.as_stream().unwrap().get_rawdata(), b"stream payload");
}
