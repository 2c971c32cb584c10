//! quire - a PDF object reader.
//!
//! Parses PDF files into a typed object graph, decodes stream filters and
//! decrypts documents protected by the standard security handler.
//!
//! ```no_run
//! use quire_core::{DocumentStore, PDFObject};
//!
//! # fn main() -> quire_core::Result<()> {
//! let data = std::fs::read("doc.pdf")?;
//! let mut doc = DocumentStore::open(data)?;
//! doc.decrypt("")?;
//! let catalog = doc.catalog()?;
//! if let Some(PDFObject::Ref(pages)) = catalog.get("Pages") {
//!     println!("{:?}", doc.resolve(pages)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod model;
pub mod parser;

pub use codec::filters::FilterPipeline;
pub use config::ReadOptions;
pub use diagnostics::{Diagnostic, Diagnostics, WarningKind};
pub use document::security::{EncryptionEngine, PasswordType};
pub use document::store::DocumentStore;
pub use error::{PdfError, Result};
pub use model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
