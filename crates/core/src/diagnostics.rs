//! Warning sink for recoverable problems found while reading a document.
//!
//! Every component that can recover from malformed input takes a
//! `&Diagnostics`. In lenient mode a warning is logged through `tracing`
//! and recorded; in strict mode it becomes `PdfError::Strict`.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::error::{PdfError, Result};

/// Category of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    MissingHeader,
    MissingEof,
    DuplicateKey,
    UnknownEscape,
    InvalidName,
    StreamLength,
    Endstream,
    XrefResync,
    XrefRecord,
    XrefIndexShift,
    XrefRebuild,
    XrefPrev,
    XrefStream,
    ObjectHeader,
    ObjectStream,
    Predictor,
    UnknownFilter,
    CorruptFlate,
    Perms,
}

impl WarningKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingHeader => "missing_header",
            Self::MissingEof => "missing_eof",
            Self::DuplicateKey => "duplicate_key",
            Self::UnknownEscape => "unknown_escape",
            Self::InvalidName => "invalid_name",
            Self::StreamLength => "stream_length",
            Self::Endstream => "endstream",
            Self::XrefResync => "xref_resync",
            Self::XrefRecord => "xref_record",
            Self::XrefIndexShift => "xref_index_shift",
            Self::XrefRebuild => "xref_rebuild",
            Self::XrefPrev => "xref_prev",
            Self::XrefStream => "xref_stream",
            Self::ObjectHeader => "object_header",
            Self::ObjectStream => "object_stream",
            Self::Predictor => "predictor",
            Self::UnknownFilter => "unknown_filter",
            Self::CorruptFlate => "corrupt_flate",
            Self::Perms => "perms",
        }
    }

    const fn domain(self) -> &'static str {
        match self {
            Self::MissingHeader | Self::MissingEof => "pdf.document",
            Self::DuplicateKey
            | Self::UnknownEscape
            | Self::InvalidName
            | Self::StreamLength
            | Self::Endstream => "pdf.parser",
            Self::XrefResync
            | Self::XrefRecord
            | Self::XrefIndexShift
            | Self::XrefRebuild
            | Self::XrefPrev
            | Self::XrefStream => "pdf.xref",
            Self::ObjectHeader | Self::ObjectStream => "pdf.store",
            Self::Predictor | Self::UnknownFilter | Self::CorruptFlate => "pdf.filter",
            Self::Perms => "pdf.security",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: WarningKind,
    pub offset: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(off) => write!(f, "[{}] {} (offset {})", self.kind, self.message, off),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    strict: bool,
    records: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            records: Mutex::new(Vec::new()),
        }
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    /// Report a recoverable problem.
    ///
    /// Returns `Err(PdfError::Strict)` in strict mode so callers can `?` it.
    pub fn warn(
        &self,
        kind: WarningKind,
        offset: Option<usize>,
        message: impl Into<String>,
    ) -> Result<()> {
        let message = message.into();
        if self.strict {
            return Err(PdfError::Strict(format!("{kind}: {message}")));
        }
        warn!(
            domain = kind.domain(),
            kind = kind.as_str(),
            offset = offset,
            "{}",
            message
        );
        self.push(Diagnostic {
            kind,
            offset,
            message,
        });
        Ok(())
    }

    /// Record a problem that is never fatal, even in strict mode.
    pub fn note(&self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!(domain = kind.domain(), kind = kind.as_str(), "{}", message);
        self.push(Diagnostic {
            kind,
            offset: None,
            message,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, diag: Diagnostic) {
        self.lock().push(diag);
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, kind: WarningKind) -> bool {
        self.lock().iter().any(|d| d.kind == kind)
    }
}
