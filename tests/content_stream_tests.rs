//! Content stream interpretation tests
//!
//! Each test draws one page with a 600-unit fixed-width font, so a glyph
//! advances 0.6 × font size.

mod test_utils;

use pdf_x_extract::core::*;
use test_utils::*;

fn runs_of(content: &str) -> (Vec<TextRun>, Vec<Diagnostic>) {
    let result = extract_sequential(&fixed_width_page(content).build());
    let page = result.pages.into_iter().next().expect("one page");
    (page.runs, page.diagnostics)
}

fn has_diagnostic(diagnostics: &[Diagnostic], kind: DiagnosticKind) -> bool {
    diagnostics.iter().any(|d| d.kind == kind)
}

// ============================================================================
// Text Positioning
// ============================================================================

#[test]
fn test_single_run_position_and_size() {
    let (runs, diagnostics) = runs_of(HELLO_CONTENT);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "Hello");
    assert_point(runs[0].origin, 100.0, 700.0);
    assert_close(runs[0].font_size, 12.0);
    assert_close(runs[0].advance, 5.0 * 0.6 * 12.0);
    assert_eq!(runs[0].page, 0);
    assert!(diagnostics.is_empty(), "{:?}", diagnostics);
}

#[test]
fn test_tj_adjustment_is_proportional_to_font_size() {
    // Baseline: no adjustment, B follows A's 6-unit advance
    let (plain, _) = runs_of("BT /F1 10 Tf 100 700 Td [(A) 0 (B)] TJ ET");
    assert_point(plain[1].origin, 106.0, 700.0);

    // -1000/1000 × 10 moves B right by 10
    let (wide, _) = runs_of("BT /F1 10 Tf 100 700 Td [(A) -1000 (B)] TJ ET");
    assert_eq!(wide.len(), 2);
    assert_point(wide[0].origin, 100.0, 700.0);
    assert_point(wide[1].origin, 116.0, 700.0);

    // 500/1000 × 20 moves B left by 10
    let (tight, _) = runs_of("BT /F1 20 Tf 100 700 Td [(A) 500 (B)] TJ ET");
    assert_point(tight[1].origin, 100.0 + 12.0 - 10.0, 700.0);
}

#[test]
fn test_tj_adjustment_follows_text_matrix_scale() {
    // Text space is scaled by 2: A advances 6 units, the shift is 10 units
    let (runs, _) = runs_of("BT /F1 10 Tf 2 0 0 2 100 700 Tm [(A) -1000 (B)] TJ ET");
    assert_point(runs[1].origin, 100.0 + 2.0 * (6.0 + 10.0), 700.0);
    assert_close(runs[1].font_size, 20.0);
}

#[test]
fn test_vendor_operator_before_td() {
    let (runs, _) = runs_of("BT /F1 12 Tf /Tag 3 vnd 100 700 Td (Hi) Tj ET");
    assert_eq!(runs.len(), 1);
    assert_point(runs[0].origin, 100.0, 700.0);
}

#[test]
fn test_leading_and_next_line_operators() {
    let (runs, _) = runs_of("BT /F1 10 Tf 14 TL 72 700 Td (a) Tj T* (b) Tj (c) ' ET");
    let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, ["a", "b", "c"]);
    assert_point(runs[0].origin, 72.0, 700.0);
    assert_point(runs[1].origin, 72.0, 686.0);
    assert_point(runs[2].origin, 72.0, 672.0);
}

#[test]
fn test_word_spacing_applies_to_spaces_only() {
    let (runs, _) = runs_of("BT /F1 10 Tf 5 Tw 0 0 Td (a b) Tj (c) Tj ET");
    assert_close(runs[0].advance, 3.0 * 6.0 + 5.0);
    assert_point(runs[1].origin, 23.0, 0.0);
}

#[test]
fn test_save_restore_scopes_the_ctm() {
    let (runs, _) = runs_of(
        "q 1 0 0 1 50 50 cm BT /F1 10 Tf 0 0 Td (In) Tj ET Q \
         BT /F1 10 Tf 0 0 Td (Out) Tj ET",
    );
    assert_point(runs[0].origin, 50.0, 50.0);
    assert_point(runs[1].origin, 0.0, 0.0);
}

// ============================================================================
// Forms
// ============================================================================

#[test]
fn test_form_xobject_inherits_resources_and_matrix() {
    let pdf = page_with_resources(
        "q 1 0 0 1 100 100 cm /Fm1 Do Q BT /F1 10 Tf 10 10 Td (Page) Tj ET",
        "<< /Font << /F1 5 0 R >> /XObject << /Fm1 6 0 R >> >>",
    )
    .stream(
        6,
        "/Type /XObject /Subtype /Form /BBox [0 0 100 100] /Matrix [1 0 0 1 50 0]",
        b"BT /F1 10 Tf 0 0 Td (Form) Tj ET",
    )
    .build();
    let result = extract_sequential(&pdf);
    let runs = &result.pages[0].runs;

    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].text, "Form");
    assert_point(runs[0].origin, 150.0, 100.0);
    assert_point(runs[1].origin, 10.0, 10.0);
}

#[test]
fn test_self_painting_form_is_cut_off() {
    let pdf = page_with_resources(
        "/Fm1 Do",
        "<< /Font << /F1 5 0 R >> /XObject << /Fm1 6 0 R >> >>",
    )
    .stream(
        6,
        "/Type /XObject /Subtype /Form /BBox [0 0 100 100]",
        b"/Fm1 Do BT /F1 10 Tf (X) Tj ET",
    )
    .build();
    let result = extract_sequential(&pdf);
    let page = &result.pages[0];

    assert_eq!(page.runs.len(), 1);
    assert!(has_diagnostic(&page.diagnostics, DiagnosticKind::FormRecursion));
}

// ============================================================================
// Recoverable Faults
// ============================================================================

#[test]
fn test_missing_font_falls_back() {
    let (runs, diagnostics) = runs_of("BT /F9 12 Tf 10 10 Td (abc) Tj ET");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].text, "abc");
    assert!(has_diagnostic(&diagnostics, DiagnosticKind::MissingFont));
}

#[test]
fn test_operand_underflow_skips_the_operator() {
    let (runs, diagnostics) = runs_of("BT /F1 12 Tf 100 Td (x) Tj ET");
    assert_eq!(runs.len(), 1);
    assert_point(runs[0].origin, 0.0, 0.0);
    assert!(has_diagnostic(&diagnostics, DiagnosticKind::OperandUnderflow));
}

#[test]
fn test_missing_xobject_is_recorded() {
    let (runs, diagnostics) = runs_of("/Nope Do BT /F1 12 Tf (still here) Tj ET");
    assert_eq!(runs[0].text, "still here");
    assert!(has_diagnostic(&diagnostics, DiagnosticKind::BadImage));
}

#[test]
fn test_non_numeric_operands_skip_the_operator() {
    let (runs, diagnostics) = runs_of("BT /F1 10 Tf 10 20 Td (x) (y) Td 1 (red) 0 rg (z) Tj ET");
    assert_eq!(runs.len(), 1);
    assert_point(runs[0].origin, 10.0, 20.0);
    let syntax = diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Syntax)
        .count();
    assert_eq!(syntax, 2);
}

#[test]
fn test_dangling_font_reference_empties_the_page() {
    let pdf = page_with_resources(HELLO_CONTENT, "<< /Font << /F1 99 0 R >> >>").build();
    let page = extract_sequential(&pdf).pages.remove(0);
    assert!(page.runs.is_empty());
    assert!(has_diagnostic(&page.diagnostics, DiagnosticKind::ObjectNotFound));
}
