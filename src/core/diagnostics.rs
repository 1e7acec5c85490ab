use super::error::PDFError;
use serde::{Deserialize, Serialize};

/// Category of a recoverable fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedFile,
    MalformedXref,
    ObjectNotFound,
    CircularReference,
    CorruptStream,
    UnsupportedFilter,
    UnsupportedColorSpace,
    ResourceLimitExceeded,
    Encrypted,
    /// Known operator with too few operands
    OperandUnderflow,
    /// Missing or unusable font resource
    MissingFont,
    /// Missing or unusable XObject or inline image
    BadImage,
    /// Form XObject nesting too deep or re-entered
    FormRecursion,
    Syntax,
    Other,
}

/// One recorded fault, attached to the page it occurred on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Zero-based page index, None for document-level faults
    pub page: Option<usize>,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Collects diagnostics for one page (or the document) and logs each one.
#[derive(Debug, Default)]
pub struct Diagnostics {
    page: Option<usize>,
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates a collector for `page`.
    pub fn for_page(page: usize) -> Self {
        Diagnostics {
            page: Some(page),
            items: Vec::new(),
        }
    }

    /// Creates a document-level collector.
    pub fn for_document() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        match self.page {
            Some(page) => log::warn!("page {}: {:?}: {}", page, kind, message),
            None => log::warn!("{:?}: {}", kind, message),
        }
        self.items.push(Diagnostic {
            page: self.page,
            kind,
            message,
        });
    }

    /// Records an error with context, e.g. `"font /F1"`.
    pub fn record_error(&mut self, context: &str, error: &PDFError) {
        self.record(error.kind(), format!("{}: {}", context, error));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}
