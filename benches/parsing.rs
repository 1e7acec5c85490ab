/// Benchmarks for parsing and extraction performance
///
/// Run with: cargo bench
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pdf_x_extract::core::ContentStreamReader;
use pdf_x_extract::fixture::PdfBuilder;
use pdf_x_extract::{ExtractOptions, PDFDocument, extract_with_options};

/// A document with `pages` pages of `lines` text lines each.
fn synthetic_document(pages: usize, lines: usize, xref_stream: bool) -> Vec<u8> {
    let mut content = String::from("BT /F1 10 Tf 12 TL 72 740 Td\n");
    for i in 0..lines {
        content.push_str(&format!("(Line {} of the benchmark page, some words here) Tj T*\n", i));
    }
    content.push_str("ET");
    let contents: Vec<&str> = (0..pages).map(|_| content.as_str()).collect();
    PdfBuilder::with_pages(&contents)
        .xref_stream(xref_stream)
        .build()
}

/// Benchmark PDF document opening
fn benchmark_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_opening");

    for (name, xref_stream) in [("xref_table", false), ("xref_stream", true)] {
        let data = synthetic_document(200, 1, xref_stream);
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| PDFDocument::open(black_box(data.clone())));
        });
    }

    group.finish();
}

/// Benchmark page tree traversal
fn benchmark_page_tree(c: &mut Criterion) {
    let data = synthetic_document(500, 1, false);
    if let Ok(doc) = PDFDocument::open(data) {
        c.bench_function("page_tree_500", |b| {
            b.iter(|| doc.pages(black_box(usize::MAX)));
        });
    }
}

/// Benchmark the content stream reader alone
fn benchmark_content_reader(c: &mut Criterion) {
    let mut content = String::from("BT /F1 10 Tf\n");
    for i in 0..2000 {
        content.push_str(&format!("{} {} Td [(Word) -250 (spacing)] TJ\n", i % 7, -12));
    }
    content.push_str("ET");

    let mut group = c.benchmark_group("content_stream");
    group.throughput(Throughput::Bytes(content.len() as u64));
    group.bench_function("read_operations", |b| {
        b.iter(|| {
            let Ok(mut reader) = ContentStreamReader::new(black_box(content.as_bytes())) else {
                return 0;
            };
            let mut count = 0;
            while let Ok(Some(_)) = reader.read_operation() {
                count += 1;
            }
            count
        });
    });
    group.finish();
}

/// Benchmark full extraction, sequential and parallel
fn benchmark_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("extraction");
    let data = synthetic_document(50, 40, false);

    for parallel in [false, true] {
        let options = ExtractOptions::default().with_parallel(parallel);
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_with_input(BenchmarkId::from_parameter(name), &data, |b, data| {
            b.iter(|| extract_with_options(black_box(data), &options));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_open,
    benchmark_page_tree,
    benchmark_content_reader,
    benchmark_extraction
);
criterion_main!(benches);
