//! Tokenizing and parsing.
//!
//! - `scanner`: byte cursor with PDF character classes
//! - `pdf_parser`: recursive-descent parser for objects and streams

pub mod pdf_parser;
pub mod scanner;

pub use pdf_parser::{ObjectResolver, PDFParser, parse_value};
pub use scanner::ByteScanner;
