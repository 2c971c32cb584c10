//! PDF object model.
//!
//! - `objects`: the `PDFObject` union, streams and references
//! - `text`: PDFDocEncoding and text/byte string classification
//! - `serialize`: writing objects back out in PDF syntax

pub mod objects;
pub mod serialize;
pub mod text;

pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
pub use serialize::serialize;
pub use text::PdfText;
