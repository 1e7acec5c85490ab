//! Extraction orchestrator.
//!
//! Opens the document, walks the page tree, interprets every page and
//! assembles the result. Fatal errors (malformed file, encryption, any
//! exceeded limit) fail the whole request and discard partial work. Every
//! other page-level fault empties that page and is recorded on it.

use super::content_stream::{ContentEvent, Interpreter};
use super::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use super::document::{DocumentInfo, PDFDocument};
use super::error::PDFResult;
use super::graphics_state::Rect;
use super::image::{ExtractedImage, extract_image};
use super::limits::{Deadline, ExtractionLimits};
use super::page::Page;
use super::text_layout::{LayoutConfig, TextBlock, TextLayout, TextLine, TextRun};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Options for one extraction request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractOptions {
    pub limits: ExtractionLimits,
    pub layout: LayoutConfig,
    /// Interpret pages on the rayon pool (needs the `parallel` feature)
    pub parallel: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            limits: ExtractionLimits::default(),
            layout: LayoutConfig::default(),
            parallel: cfg!(feature = "parallel"),
        }
    }
}

impl ExtractOptions {
    pub fn with_limits(mut self, limits: ExtractionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.limits.max_pages = max_pages;
        self
    }

    pub fn with_max_decoded_bytes(mut self, max_decoded_bytes: usize) -> Self {
        self.limits.max_decoded_bytes = max_decoded_bytes;
        self
    }

    pub fn with_max_duration_ms(mut self, max_duration_ms: u64) -> Self {
        self.limits.max_duration_ms = max_duration_ms;
        self
    }
}

/// Everything extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub page: usize,
    pub media_box: Rect,
    pub crop_box: Option<Rect>,
    pub rotate: i64,
    pub runs: Vec<TextRun>,
    pub lines: Vec<TextLine>,
    pub blocks: Vec<TextBlock>,
    pub images: Vec<ExtractedImage>,
    pub diagnostics: Vec<Diagnostic>,
}

impl PageContent {
    /// Block texts separated by blank lines.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The result of a successful extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub info: DocumentInfo,
    /// Pages in document order
    pub pages: Vec<PageContent>,
    /// Faults not tied to a page
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractionResult {
    /// Page texts separated by form feeds.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(PageContent::text)
            .collect::<Vec<_>>()
            .join("\n\u{c}")
    }

    /// All runs of all pages in order.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.pages.iter().flat_map(|p| p.runs.iter())
    }

    pub fn images(&self) -> impl Iterator<Item = &ExtractedImage> {
        self.pages.iter().flat_map(|p| p.images.iter())
    }

    /// Document-level diagnostics followed by each page's.
    pub fn all_diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .chain(self.pages.iter().flat_map(|p| p.diagnostics.iter()))
    }
}

/// Runs a full extraction over an in-memory PDF.
pub fn extract_document(data: &[u8], options: &ExtractOptions) -> PDFResult<ExtractionResult> {
    let deadline = options.limits.start_deadline();
    let doc = PDFDocument::open_with_limit(data.to_vec(), options.limits.max_decoded_bytes)?;
    let pages = doc.pages(options.limits.max_pages)?;
    deadline.check()?;

    let info = doc.info(pages.len());
    let mut diagnostics = Diagnostics::for_document();
    if info.version.is_none() {
        diagnostics.record(DiagnosticKind::MalformedFile, "missing %PDF- header");
    }

    let contents = extract_pages(&doc, &pages, deadline, options)?;
    let stats = doc.xref().stats();
    log::debug!(
        "Extracted {} pages in {} ms ({} objects parsed, {} cache hits)",
        contents.len(),
        deadline.elapsed_ms(),
        stats.parsed,
        stats.cache_hits
    );

    Ok(ExtractionResult {
        info,
        pages: contents,
        diagnostics: diagnostics.into_vec(),
    })
}

fn extract_pages(
    doc: &PDFDocument,
    pages: &[Page],
    deadline: Deadline,
    options: &ExtractOptions,
) -> PDFResult<Vec<PageContent>> {
    let layout = &options.layout;

    #[cfg(feature = "parallel")]
    if options.parallel && pages.len() > 1 {
        return pages
            .par_iter()
            .map(|page| extract_page(doc, page, deadline, layout))
            .collect();
    }

    pages
        .iter()
        .map(|page| extract_page(doc, page, deadline, layout))
        .collect()
}

/// Extracts one page, emptying it on any non-fatal fault.
pub fn extract_page(
    doc: &PDFDocument,
    page: &Page,
    deadline: Deadline,
    layout: &LayoutConfig,
) -> PDFResult<PageContent> {
    let mut diagnostics = Diagnostics::for_page(page.index());

    let (runs, images) = match interpret_page(doc, page, deadline, &mut diagnostics) {
        Ok(content) => content,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            diagnostics.record_error("page emptied", &e);
            (Vec::new(), Vec::new())
        }
    };
    let TextLayout {
        runs,
        lines,
        blocks,
    } = TextLayout::assemble(runs, layout);

    Ok(PageContent {
        page: page.index(),
        media_box: page.media_box(),
        crop_box: page.crop_box(),
        rotate: page.rotate(),
        runs,
        lines,
        blocks,
        images,
        diagnostics: diagnostics.into_vec(),
    })
}

fn interpret_page(
    doc: &PDFDocument,
    page: &Page,
    deadline: Deadline,
    diagnostics: &mut Diagnostics,
) -> PDFResult<(Vec<TextRun>, Vec<ExtractedImage>)> {
    let xref = doc.xref();
    let resources = page.resources(xref)?;
    let content = page.content_bytes(xref, diagnostics)?;

    let mut interpreter = Interpreter::new(xref, deadline, diagnostics);
    interpreter.run(&content, &resources)?;
    let events = interpreter.into_events();

    let mut runs = Vec::new();
    let mut images = Vec::new();
    for event in &events {
        match event {
            ContentEvent::Text(text) => runs.push(TextRun::from_event(text, page.index())),
            ContentEvent::Image(image) => {
                if let Some(image) = extract_image(image, page.index(), xref, diagnostics)? {
                    images.push(image);
                }
            }
        }
    }
    deadline.check()?;
    Ok((runs, images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::PdfBuilder;

    #[test]
    fn test_options_builder_and_json() {
        let options = ExtractOptions::default()
            .with_max_pages(5)
            .with_parallel(false)
            .with_max_duration_ms(10);
        assert_eq!(options.limits.max_pages, 5);
        assert_eq!(options.limits.max_duration_ms, 10);
        assert!(!options.parallel);

        let parsed: ExtractOptions =
            serde_json::from_str(r#"{"limits": {"maxPages": 2}, "layout": {"wordGap": 0.5}}"#)
                .unwrap();
        assert_eq!(parsed.limits.max_pages, 2);
        assert_eq!(parsed.limits.max_duration_ms, 60_000);
        assert_eq!(parsed.layout.word_gap, 0.5);
    }

    #[test]
    fn test_missing_content_object_empties_page() {
        let pdf = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(3, "<< /Type /Page /Parent 2 0 R /Contents 99 0 R >>")
            .root(1)
            .build();
        let result = extract_document(&pdf, &ExtractOptions::default()).unwrap();
        assert_eq!(result.pages.len(), 1);
        assert!(result.pages[0].runs.is_empty());
        assert_eq!(
            result.pages[0].diagnostics[0].kind,
            DiagnosticKind::ObjectNotFound
        );
    }

    #[test]
    fn test_text_joins_pages() {
        let pdf = PdfBuilder::with_pages(&[
            "BT /F1 12 Tf 72 700 Td (one) Tj ET",
            "BT /F1 12 Tf 72 700 Td (two) Tj ET",
        ])
        .build();
        let result =
            extract_document(&pdf, &ExtractOptions::default().with_parallel(false)).unwrap();
        assert_eq!(result.text(), "one\n\u{c}two");
        assert_eq!(result.runs().count(), 2);
    }
}
