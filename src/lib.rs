//! PDF parsing and content extraction.
//!
//! ```
//! use pdf_x_extract::{ExtractionLimits, extract, fixture::PdfBuilder};
//!
//! let pdf = PdfBuilder::single_page("BT /F1 12 Tf 100 700 Td (Hello) Tj ET").build();
//! let result = extract(&pdf, &ExtractionLimits::default()).unwrap();
//! assert_eq!(result.text(), "Hello");
//! ```

pub mod core;
pub mod fixture;
pub mod response;

// Re-export main types for convenience
pub use core::{
    Diagnostic, DiagnosticKind, DocumentInfo, ExtractOptions, ExtractedImage, ExtractionError,
    ExtractionLimits, ExtractionResult, ImageEncoding, LayoutConfig, PDFDocument, PDFError,
    PDFObject, PDFResult, PageContent, Rect, TextBlock, TextLine, TextRun,
};
pub use response::{ExtractionResponse, HealthStatus, payload_bytes};

/// Extracts text runs, layout and images from an in-memory PDF.
///
/// Either the whole document succeeds or a single error is returned;
/// recoverable faults are reported as diagnostics inside the result.
pub fn extract(pdf_bytes: &[u8], limits: &ExtractionLimits) -> PDFResult<ExtractionResult> {
    extract_with_options(pdf_bytes, &ExtractOptions::default().with_limits(*limits))
}

pub fn extract_with_options(
    pdf_bytes: &[u8],
    options: &ExtractOptions,
) -> PDFResult<ExtractionResult> {
    core::extract_document(pdf_bytes, options)
}

/// Content stream of the embedded health-check document.
const SELF_CHECK_CONTENT: &str = "BT /F1 12 Tf 100 700 Td (Hello) Tj ET";

/// Runs a smoke extraction over an embedded one-page document.
pub fn self_check() -> Result<(), String> {
    let pdf = fixture::PdfBuilder::single_page(SELF_CHECK_CONTENT).build();
    let result = extract(&pdf, &ExtractionLimits::default()).map_err(|e| e.to_string())?;

    let runs: Vec<&TextRun> = result.runs().collect();
    let [run] = runs.as_slice() else {
        return Err(format!("expected one text run, got {}", runs.len()));
    };
    if run.text != "Hello" {
        return Err(format!("expected text \"Hello\", got {:?}", run.text));
    }
    if (run.origin.x - 100.0).abs() > 1e-6 || (run.origin.y - 700.0).abs() > 1e-6 {
        return Err(format!(
            "expected origin (100, 700), got ({}, {})",
            run.origin.x, run.origin.y
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_check_passes() {
        assert_eq!(self_check(), Ok(()));
    }
}
