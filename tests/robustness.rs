//! Robustness tests: malformed and arbitrary input never panics
//!
//! Property tests mutate synthetic documents and feed random bytes to each
//! layer. The ignored test runs a local corpus of real-world files.

mod test_utils;

use pdf_x_extract::core::decode::{apply_predictor, decode_stream};
use pdf_x_extract::core::*;
use pdf_x_extract::fixture::{PdfBuilder, flate};
use pdf_x_extract::{ExtractionLimits, extract};
use proptest::prelude::*;
use std::path::Path;
use test_utils::*;

/// Small limits so random input cannot make a case slow.
fn tight_limits() -> ExtractionLimits {
    ExtractionLimits::default()
        .with_max_pages(50)
        .with_max_decoded_bytes(1 << 20)
        .with_max_duration_ms(5_000)
}

fn filter_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "FlateDecode",
        "LZWDecode",
        "ASCIIHexDecode",
        "ASCII85Decode",
        "RunLengthDecode",
        "DCTDecode",
        "Crypt",
    ])
}

/// /DecodeParms with small, large and overflowing row geometry.
fn predictor_params() -> impl Strategy<Value = Dict> {
    (
        prop::sample::select(vec![1i64, 2, 10, 11, 12, 13, 14, 15, 16]),
        prop_oneof![
            1i64..64,
            Just(200_000_000_000i64),
            Just(1i64 << 62),
            Just(i64::MAX),
            Just(-1i64),
        ],
        prop_oneof![0i64..40, Just(i64::MAX)],
        prop::sample::select(vec![0i64, 1, 2, 3, 4, 8, 16, 1 << 40]),
    )
        .prop_map(|(predictor, columns, colors, bits)| {
            let mut params = Dict::default();
            params.insert("Predictor".into(), PDFObject::Integer(predictor));
            params.insert("Columns".into(), PDFObject::Integer(columns));
            params.insert("Colors".into(), PDFObject::Integer(colors));
            params.insert("BitsPerComponent".into(), PDFObject::Integer(bits));
            params
        })
}

// ============================================================================
// Layer Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_parser_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let lexer = Lexer::new(Box::new(Stream::from_bytes(data)));
        if let Ok(lexer) = lexer {
            if let Ok(mut parser) = Parser::new(lexer) {
                for _ in 0..256 {
                    match parser.get_object() {
                        Ok(PDFObject::EOF) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
        }
    }

    #[test]
    fn prop_filters_never_panic(
        filter in filter_name(),
        data in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut dict = Dict::default();
        dict.insert("Filter".into(), PDFObject::Name(filter.to_string()));
        let _ = decode_stream(&dict, &data, 1 << 20);
    }

    #[test]
    fn prop_predictors_never_panic(
        params in predictor_params(),
        data in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let _ = apply_predictor(data.clone(), Some(&params), 1 << 10);

        let mut dict = Dict::default();
        dict.insert("Filter".into(), PDFObject::Name("FlateDecode".into()));
        dict.insert("DecodeParms".into(), PDFObject::Dictionary(params));
        if let Ok(decoded) = decode_stream(&dict, &flate(&data), 1 << 10) {
            prop_assert!(decoded.data.len() <= 1 << 10);
        }
    }

    #[test]
    fn prop_content_reader_never_panics(content in prop::collection::vec(any::<u8>(), 0..512)) {
        if let Ok(mut reader) = ContentStreamReader::new(&content) {
            for _ in 0..512 {
                match reader.read_operation() {
                    Ok(Some(_)) => {}
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }

    #[test]
    fn prop_extract_never_panics_on_random_bytes(data in prop::collection::vec(any::<u8>(), 0..1024)) {
        let _ = extract(&data, &tight_limits());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any operator soup inside a valid document still yields a result.
    #[test]
    fn prop_arbitrary_content_still_extracts(
        tokens in prop::collection::vec(
            prop::sample::select(vec![
                "BT", "ET", "q", "Q", "Tj", "TJ", "Td", "TD", "Tm", "T*", "'", "\"",
                "Tf", "TL", "Tc", "Tw", "Tz", "Ts", "cm", "Do", "gs", "rg", "scn",
                "12", "-3.5", "0", "1000", "(text)", "[(a) -120 (b)]", "/F1", "/Im1",
                "<00410042>", "BI", "ID", "EI",
            ]),
            0..80,
        ),
    ) {
        let content = tokens.join(" ");
        let pdf = fixed_width_page(&content).build();
        prop_assert!(extract(&pdf, &tight_limits()).is_ok());
    }

    /// Corrupting bytes of a valid file never panics.
    #[test]
    fn prop_mutated_document_never_panics(
        flips in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
    ) {
        let mut pdf = PdfBuilder::with_pages(&[HELLO_CONTENT, HELLO_CONTENT]).build();
        for (index, byte) in flips {
            let i = index.index(pdf.len());
            pdf[i] = byte;
        }
        let _ = extract(&pdf, &tight_limits());
    }

    /// Truncated files either fail cleanly or extract.
    #[test]
    fn prop_truncated_document_never_panics(cut in any::<prop::sample::Index>()) {
        let pdf = PdfBuilder::single_page(HELLO_CONTENT).xref_stream(true).build();
        let len = cut.index(pdf.len());
        let _ = extract(&pdf[..len], &tight_limits());
    }
}

// ============================================================================
// Real-World Corpus
// ============================================================================

#[test]
#[ignore] // Run manually: PDF_CORPUS=dir cargo test --test robustness -- --ignored --nocapture
fn test_local_corpus() {
    let Ok(dir) = std::env::var("PDF_CORPUS") else {
        eprintln!("PDF_CORPUS not set, skipping");
        return;
    };
    let test_dir = Path::new(&dir);

    let mut total = 0;
    let mut success = 0;
    let mut failures = Vec::new();

    let entries = std::fs::read_dir(test_dir).expect("Failed to read corpus directory");
    for entry in entries {
        let path = entry.expect("Failed to read entry").path();
        if path.extension().and_then(|s| s.to_str()) != Some("pdf") {
            continue;
        }
        total += 1;
        let name = path.display().to_string();

        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                failures.push((name, format!("Read error: {}", e)));
                continue;
            }
        };
        match extract(&data, &ExtractionLimits::default()) {
            Ok(result) => {
                success += 1;
                let diagnostics = result.all_diagnostics().count();
                println!(
                    "✓ {} ({} pages, {} runs, {} diagnostics)",
                    name,
                    result.pages.len(),
                    result.runs().count(),
                    diagnostics
                );
            }
            Err(e) => {
                println!("✗ {} - {}", name, e);
                failures.push((name, e.to_string()));
            }
        }
    }

    println!("\nTotal: {}, extracted: {}, failed: {}", total, success, failures.len());
    for (name, error) in &failures {
        println!("  - {}: {}", name, error);
    }
}
