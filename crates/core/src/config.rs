//! Reader configuration.

/// Options controlling how tolerant the reader is of malformed input.
///
/// The default is lenient: recoverable problems are logged and recorded
/// as diagnostics instead of aborting the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Promote every recoverable warning to a hard error.
    pub strict: bool,
    /// Maximum nesting of arrays and dictionaries accepted by the parser.
    pub max_depth: usize,
    /// Pass stream data through unchanged when a filter is unknown.
    pub tolerate_unknown_filters: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_depth: 256,
            tolerate_unknown_filters: false,
        }
    }
}

impl ReadOptions {
    /// Lenient defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict reading: every recoverable problem becomes an error.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub const fn with_tolerate_unknown_filters(mut self, tolerate: bool) -> Self {
        self.tolerate_unknown_filters = tolerate;
        self
    }
}
