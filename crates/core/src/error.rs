//! Error types for quire PDF parsing.

use thiserror::Error;

/// Primary error type for parsing, decoding and decrypting PDF data.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("unexpected end of input at offset {0}")]
    TruncatedStream(usize),

    #[error("malformed stream: {0}")]
    MalformedStream(String),

    #[error("unexpected token at position {pos}: {msg}")]
    UnexpectedToken { pos: usize, msg: String },

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("unsupported predictor: {0}")]
    UnsupportedPredictor(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("object {idnum} {generation} is not defined")]
    ObjectNotDefined { idnum: u32, generation: u16 },

    #[error("missing dependency: {0}")]
    DependencyError(String),

    #[error("file has not been decrypted")]
    FileNotDecrypted,

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("key not found: {0}")]
    KeyError(String),

    #[error("circular reference to object {idnum} {generation}")]
    CircularReference { idnum: u32, generation: u16 },

    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("no valid xref table found: {0}")]
    NoValidXRef(String),

    #[error("cannot read an empty file")]
    EmptyFile,

    #[error("strict mode: {0}")]
    Strict(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfError {
    /// Shorthand for a lexer/parser dispatch failure.
    pub fn unexpected(pos: usize, msg: impl Into<String>) -> Self {
        Self::UnexpectedToken {
            pos,
            msg: msg.into(),
        }
    }

    /// True for errors that mean the document bytes themselves are unusable.
    pub const fn is_unreadable(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream(_) | Self::MalformedStream(_) | Self::NoValidXRef(_)
        )
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
