use super::diagnostics::DiagnosticKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Universal error type for parsing and extraction.
///
/// The first group of variants is the caller-facing taxonomy. The second
/// group is raised by the low-level readers and usually gets mapped onto the
/// taxonomy by the component that sees it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PDFError {
    /// Trailer or startxref could not be located or parsed
    #[error("Malformed file: {0}")]
    MalformedFile(String),

    /// The xref table/stream chain is structurally invalid
    #[error("Malformed xref: {0}")]
    MalformedXref(String),

    /// Indirect object is absent, free, or has another generation
    #[error("Object {num} {generation} R not found")]
    ObjectNotFound { num: u32, generation: u32 },

    /// Resolving an object revisited an object already being resolved
    #[error("Circular reference while resolving object {num} {generation} R")]
    CircularReference { num: u32, generation: u32 },

    /// Filter failed on structurally invalid input
    #[error("Corrupt {filter} stream: {message}")]
    CorruptStream { filter: String, message: String },

    /// Filter is not implemented (or is an image codec in a non-image stream)
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Color space could not be interpreted
    #[error("Unsupported color space: {0}")]
    UnsupportedColorSpace(String),

    /// A configured resource limit was exceeded
    #[error("Resource limit exceeded ({limit}): {message}")]
    ResourceLimitExceeded { limit: LimitKind, message: String },

    /// Document is encrypted
    #[error("Encrypted documents are not supported")]
    Encrypted,

    /// End of stream reached unexpectedly
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// Invalid byte range requested
    #[error("Invalid byte range: {begin}..{end}")]
    InvalidByteRange { begin: usize, end: usize },

    /// Invalid stream position
    #[error("Invalid position {pos} for stream of length {length}")]
    InvalidPosition { pos: usize, length: usize },

    /// Lexical or grammatical error in PDF syntax
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Which limit tripped a [`PDFError::ResourceLimitExceeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    MaxPages,
    MaxDecodedBytes,
    MaxDuration,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LimitKind::MaxPages => "maxPages",
            LimitKind::MaxDecodedBytes => "maxDecodedBytes",
            LimitKind::MaxDuration => "maxDurationMs",
        };
        f.write_str(name)
    }
}

impl PDFError {
    pub fn syntax(message: impl Into<String>) -> Self {
        PDFError::Syntax(message.into())
    }

    pub fn corrupt(filter: &str, message: impl Into<String>) -> Self {
        PDFError::CorruptStream {
            filter: filter.to_string(),
            message: message.into(),
        }
    }

    pub fn limit(limit: LimitKind, message: impl Into<String>) -> Self {
        PDFError::ResourceLimitExceeded {
            limit,
            message: message.into(),
        }
    }

    /// Returns true if this error must fail the whole request.
    ///
    /// Everything else is contained at stream or page level.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PDFError::MalformedFile(_)
                | PDFError::ResourceLimitExceeded { .. }
                | PDFError::Encrypted
        )
    }

    /// Returns true if this error empties the page it occurs on.
    ///
    /// Dangling and cyclic references fail the operator that reached them,
    /// and with it the whole page; other non-fatal faults stay local.
    pub fn aborts_page(&self) -> bool {
        self.is_fatal()
            || matches!(
                self,
                PDFError::ObjectNotFound { .. } | PDFError::CircularReference { .. }
            )
    }

    /// Maps the error onto its diagnostic category.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            PDFError::MalformedFile(_) => DiagnosticKind::MalformedFile,
            PDFError::MalformedXref(_) => DiagnosticKind::MalformedXref,
            PDFError::ObjectNotFound { .. } => DiagnosticKind::ObjectNotFound,
            PDFError::CircularReference { .. } => DiagnosticKind::CircularReference,
            PDFError::CorruptStream { .. } => DiagnosticKind::CorruptStream,
            PDFError::UnsupportedFilter(_) => DiagnosticKind::UnsupportedFilter,
            PDFError::UnsupportedColorSpace(_) => DiagnosticKind::UnsupportedColorSpace,
            PDFError::ResourceLimitExceeded { .. } => DiagnosticKind::ResourceLimitExceeded,
            PDFError::Encrypted => DiagnosticKind::Encrypted,
            PDFError::Syntax(_)
            | PDFError::UnexpectedEndOfStream
            | PDFError::InvalidByteRange { .. }
            | PDFError::InvalidPosition { .. } => DiagnosticKind::Syntax,
            PDFError::Generic(_) => DiagnosticKind::Other,
        }
    }
}

/// Result type alias for PDF operations
pub type PDFResult<T> = Result<T, PDFError>;

/// Error returned by the extraction entry point.
pub type ExtractionError = PDFError;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PDFError::ObjectNotFound {
            num: 12,
            generation: 0,
        };
        assert_eq!(err.to_string(), "Object 12 0 R not found");

        let err = PDFError::corrupt("FlateDecode", "invalid block type");
        assert_eq!(
            err.to_string(),
            "Corrupt FlateDecode stream: invalid block type"
        );

        let err = PDFError::limit(LimitKind::MaxPages, "3 > 2");
        assert_eq!(err.to_string(), "Resource limit exceeded (maxPages): 3 > 2");
    }

    #[test]
    fn test_fatality() {
        assert!(PDFError::MalformedFile("x".into()).is_fatal());
        assert!(PDFError::limit(LimitKind::MaxDuration, "slow").is_fatal());
        assert!(!PDFError::corrupt("LZWDecode", "bad code").is_fatal());
        assert!(!PDFError::CircularReference { num: 1, generation: 0 }.is_fatal());
        assert!(PDFError::CircularReference { num: 1, generation: 0 }.aborts_page());
        assert!(PDFError::ObjectNotFound { num: 9, generation: 0 }.aborts_page());
        assert!(!PDFError::corrupt("FlateDecode", "bad").aborts_page());
        assert_eq!(PDFError::Encrypted.kind(), DiagnosticKind::Encrypted);
        assert_eq!(PDFError::UnexpectedEndOfStream.kind(), DiagnosticKind::Syntax);
    }
}
