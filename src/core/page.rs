use super::diagnostics::Diagnostics;
use super::error::PDFResult;
use super::graphics_state::Rect;
use super::parser::{Dict, PDFObject};
use super::xref::XRef;

/// US Letter, used when no MediaBox is found anywhere up the tree.
pub const DEFAULT_MEDIA_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// A single page in a PDF document.
///
/// Inheritable attributes (Resources, MediaBox, CropBox, Rotate) are
/// already merged from the page's ancestors. A page dictionary contains
/// properties like:
/// - MediaBox: The visible area of the page
/// - Resources: Fonts, images, and other resources used by the page
/// - Contents: The content stream(s) that draw the page
#[derive(Debug, Clone)]
pub struct Page {
    /// The page index (0-based)
    index: usize,

    /// The page dictionary
    dict: Dict,

    /// The indirect object reference for this page (if it has one)
    reference: Option<(u32, u32)>,

    /// Resources entry, possibly still a reference
    resources: Option<PDFObject>,

    media_box: Rect,
    crop_box: Option<Rect>,

    /// Clockwise rotation in degrees: 0, 90, 180 or 270
    rotate: i64,
}

impl Page {
    pub fn new(
        index: usize,
        dict: Dict,
        reference: Option<(u32, u32)>,
        resources: Option<PDFObject>,
        media_box: Option<Rect>,
        crop_box: Option<Rect>,
        rotate: i64,
    ) -> Self {
        Page {
            index,
            dict,
            reference,
            resources,
            media_box: media_box.unwrap_or(DEFAULT_MEDIA_BOX),
            crop_box,
            rotate: normalize_rotation(rotate),
        }
    }

    /// Returns the page index (0-based).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns a reference to the page dictionary.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// Returns the page's indirect object reference if it has one.
    pub fn reference(&self) -> Option<(u32, u32)> {
        self.reference
    }

    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    pub fn crop_box(&self) -> Option<Rect> {
        self.crop_box
    }

    pub fn rotate(&self) -> i64 {
        self.rotate
    }

    /// Resolves the (possibly inherited) Resources dictionary.
    ///
    /// A page without resources gets an empty dictionary.
    pub fn resources(&self, xref: &XRef) -> PDFResult<Dict> {
        let Some(resources) = &self.resources else {
            return Ok(Dict::default());
        };
        Ok(xref
            .fetch_if_ref(resources)?
            .as_dict()
            .cloned()
            .unwrap_or_default())
    }

    /// Decodes and concatenates the page's content streams.
    ///
    /// Contents can be either a single stream or an array of streams; the
    /// parts are joined with a newline so tokens never fuse across them.
    /// A stream that fails to decode is skipped with a diagnostic. Missing
    /// or cyclic references propagate and empty the page.
    pub fn content_bytes(&self, xref: &XRef, diagnostics: &mut Diagnostics) -> PDFResult<Vec<u8>> {
        let parts = match xref.get(&self.dict, "Contents")? {
            None => return Ok(Vec::new()),
            Some(PDFObject::Array(items)) => items,
            Some(single) => vec![single],
        };

        let mut content = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let part_ref = part.as_reference();
            let PDFObject::Stream { dict, data } = xref.fetch_if_ref(part)? else {
                log::debug!("Skipping non-stream Contents entry {}", i);
                continue;
            };
            match xref.decode_stream(&dict, &data).and_then(|d| d.into_data()) {
                Ok(bytes) => {
                    if !content.is_empty() {
                        content.push(b'\n');
                    }
                    content.extend_from_slice(&bytes);
                }
                Err(e) if e.aborts_page() => return Err(e),
                Err(e) => {
                    let context = match part_ref {
                        Some((num, generation)) => {
                            format!("content stream {} {} R", num, generation)
                        }
                        None => format!("content stream #{}", i),
                    };
                    diagnostics.record_error(&context, &e);
                }
            }
        }
        Ok(content)
    }
}

fn normalize_rotation(rotate: i64) -> i64 {
    let r = rotate.rem_euclid(360);
    if r % 90 == 0 { r } else { 0 }
}
