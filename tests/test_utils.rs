//! Test utilities shared by the integration tests
//!
//! Inputs are synthesized with `PdfBuilder`, so no fixture files are needed.

#![allow(dead_code)]

use pdf_x_extract::core::*;
use pdf_x_extract::fixture::PdfBuilder;

/// Content stream of the canonical one-run document.
pub const HELLO_CONTENT: &str = "BT /F1 12 Tf 100 700 Td (Hello) Tj ET";

/// Helvetica with explicit widths: 600 for every code from 32 to 126.
pub fn fixed_width_font() -> String {
    let widths = vec!["600"; 95].join(" ");
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
         /FirstChar 32 /LastChar 126 /Widths [{}] >>",
        widths
    )
}

/// One page (3) with its own resources, content stream (4) and the
/// fixed-width font as `/F1` (5). Further objects can be added by the
/// caller.
pub fn page_with_resources(content: &str, resources: &str) -> PdfBuilder {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources {} /Contents 4 0 R >>",
                resources
            ),
        )
        .stream(4, "", content.as_bytes())
        .object(5, &fixed_width_font())
        .root(1)
}

/// A single page using the fixed-width font.
pub fn fixed_width_page(content: &str) -> PdfBuilder {
    page_with_resources(content, "<< /Font << /F1 5 0 R >> >>")
}

/// Extracts on the calling thread with default limits.
pub fn extract_sequential(pdf: &[u8]) -> ExtractionResult {
    extract_document(pdf, &ExtractOptions::default().with_parallel(false))
        .expect("extraction should succeed")
}

/// Every operation of a content stream.
pub fn read_operations(content: &[u8]) -> Vec<Operation> {
    let mut reader = ContentStreamReader::new(content).expect("reader");
    let mut ops = Vec::new();
    while let Some(op) = reader.read_operation().expect("operation") {
        ops.push(op);
    }
    ops
}

/// Parses every top-level object of `input`.
pub fn parse_objects(input: &[u8]) -> Vec<PDFObject> {
    let lexer = Lexer::new(Box::new(Stream::from_bytes(input.to_vec()))).expect("lexer");
    let mut parser = Parser::new(lexer).expect("parser");
    let mut objects = Vec::new();
    loop {
        match parser.get_object().expect("object") {
            PDFObject::EOF => break,
            obj => objects.push(obj),
        }
    }
    objects
}

/// Asserts two floats agree to 1e-6.
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {}, got {}",
        expected,
        actual
    );
}

/// Asserts a point agrees to 1e-6.
pub fn assert_point(actual: Point, x: f64, y: f64) {
    assert_close(actual.x, x);
    assert_close(actual.y, y);
}
