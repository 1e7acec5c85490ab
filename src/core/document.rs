use super::encoding::decode_text_string;
use super::error::{LimitKind, PDFError, PDFResult};
use super::graphics_state::Rect;
use super::page::Page;
use super::parser::{Dict, PDFObject};
use super::stream::Stream;
use super::xref::XRef;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Bytes searched for the header and for `startxref`.
const TAIL_SEARCH_LEN: usize = 1024;

/// Document-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Header version, e.g. `1.7`
    pub version: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
}

/// PDF Document reader.
///
/// This is the main entry point for reading and parsing PDF documents.
/// Opening parses the cross-reference chain and loads the catalog; objects
/// are resolved lazily afterwards.
pub struct PDFDocument {
    /// The cross-reference table
    xref: XRef,

    /// The document catalog (root dictionary)
    catalog: Dict,

    version: Option<String>,
}

/// Attributes pages inherit from their ancestors.
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<PDFObject>,
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    rotate: Option<i64>,
}

impl PDFDocument {
    /// Opens a PDF document with the default decoded-stream limit.
    ///
    /// # Example
    /// ```no_run
    /// use pdf_x_extract::core::PDFDocument;
    ///
    /// let pdf_data = std::fs::read("document.pdf").unwrap();
    /// let doc = PDFDocument::open(pdf_data).unwrap();
    /// ```
    pub fn open(data: Vec<u8>) -> PDFResult<Self> {
        Self::open_with_limit(data, super::limits::ExtractionLimits::default().max_decoded_bytes)
    }

    /// Opens a PDF document, capping every decoded stream at
    /// `max_decoded_bytes`.
    ///
    /// Fails with `MalformedFile` when the trailer chain cannot be read and
    /// with `Encrypted` for encrypted documents.
    pub fn open_with_limit(data: Vec<u8>, max_decoded_bytes: usize) -> PDFResult<Self> {
        let version = Self::find_version(&data);
        if version.is_none() {
            log::warn!("No %PDF- header found, parsing anyway");
        }
        let startxref = Self::find_startxref(&data)?;

        let mut xref = XRef::new(Stream::from_bytes(data), max_decoded_bytes);
        xref.parse(startxref).map_err(|e| match e {
            PDFError::MalformedXref(_) | PDFError::ResourceLimitExceeded { .. } => e,
            other => PDFError::MalformedFile(format!("cannot read cross-reference data: {}", other)),
        })?;

        if xref.trailer().contains_key("Encrypt") {
            return Err(PDFError::Encrypted);
        }

        let catalog = xref.catalog()?;
        log::debug!(
            "Opened PDF {} with {} xref entries",
            version.as_deref().unwrap_or("?"),
            xref.len()
        );
        Ok(PDFDocument {
            xref,
            catalog,
            version,
        })
    }

    /// Reads `x.y` from a `%PDF-x.y` header near the start.
    fn find_version(data: &[u8]) -> Option<String> {
        let head = &data[..data.len().min(TAIL_SEARCH_LEN)];
        let marker = b"%PDF-";
        let pos = head.windows(marker.len()).position(|w| w == marker)?;
        let version: String = head[pos + marker.len()..]
            .iter()
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|&b| b as char)
            .collect();
        (!version.is_empty()).then_some(version)
    }

    /// Finds the byte offset of the last cross-reference section.
    ///
    /// This searches for "startxref" near the end of the file and reads
    /// the offset that follows it.
    ///
    /// Format:
    /// ```text
    /// ...
    /// startxref
    /// 12345
    /// %%EOF
    /// ```
    fn find_startxref(data: &[u8]) -> PDFResult<usize> {
        let search_start = data.len().saturating_sub(TAIL_SEARCH_LEN);
        let search_data = &data[search_start..];

        let keyword = b"startxref";
        let pos = search_data
            .windows(keyword.len())
            .rposition(|window| window == keyword)
            .ok_or_else(|| PDFError::MalformedFile("startxref not found".to_string()))?;

        let digits: String = data[search_start + pos + keyword.len()..]
            .iter()
            .skip_while(|b| b.is_ascii_whitespace())
            .take_while(|b| b.is_ascii_digit())
            .map(|&b| b as char)
            .collect();

        let offset: usize = digits
            .parse()
            .map_err(|_| PDFError::MalformedFile("no offset after startxref".to_string()))?;
        if offset >= data.len() {
            return Err(PDFError::MalformedFile(format!(
                "startxref offset {} is past the end of the file",
                offset
            )));
        }
        Ok(offset)
    }

    /// Returns the document catalog (root dictionary).
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// Returns the cross-reference table for fetching objects.
    pub fn xref(&self) -> &XRef {
        &self.xref
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Reads the Info dictionary. Unreadable entries are left empty.
    pub fn info(&self, page_count: usize) -> DocumentInfo {
        let info = match self.xref.get(self.xref.trailer(), "Info") {
            Ok(Some(PDFObject::Dictionary(dict))) => dict,
            Ok(_) => Dict::default(),
            Err(e) => {
                log::warn!("Cannot read /Info: {}", e);
                Dict::default()
            }
        };
        let text = |key: &str| -> Option<String> {
            match self.xref.get(&info, key) {
                Ok(Some(PDFObject::String(bytes))) => Some(decode_text_string(&bytes)),
                _ => None,
            }
        };

        DocumentInfo {
            version: self.version.clone(),
            title: text("Title"),
            author: text("Author"),
            subject: text("Subject"),
            keywords: text("Keywords"),
            creator: text("Creator"),
            producer: text("Producer"),
            page_count,
        }
    }

    /// Walks the page tree in document order.
    ///
    /// Inheritable attributes are merged down the ancestor chain. Fails
    /// with `CircularReference` when a node is reached twice and with
    /// `ResourceLimitExceeded` as soon as more than `max_pages` pages are
    /// found.
    pub fn pages(&self, max_pages: usize) -> PDFResult<Vec<Page>> {
        let root = self
            .catalog
            .get("Pages")
            .cloned()
            .ok_or_else(|| PDFError::MalformedFile("catalog has no /Pages".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = vec![(root, Inherited::default())];

        while let Some((node_ref, inherited)) = stack.pop() {
            let reference = node_ref.as_reference();
            if let Some((num, generation)) = reference {
                if !visited.insert((num, generation)) {
                    return Err(PDFError::CircularReference { num, generation });
                }
            }

            let node = self.xref.fetch_if_ref(&node_ref)?;
            let Some(dict) = node.as_dict() else {
                return Err(PDFError::MalformedFile(format!(
                    "page tree node is a {}",
                    node.type_name()
                )));
            };
            let inherited = self.merge_inherited(dict, inherited)?;

            let is_tree_node = match dict.get("Type").and_then(PDFObject::as_name) {
                Some("Pages") => true,
                Some("Page") => false,
                _ => dict.contains_key("Kids"),
            };

            if is_tree_node {
                let kids = self.xref.get(dict, "Kids")?.unwrap_or(PDFObject::Null);
                let Some(kids) = kids.as_array() else {
                    log::warn!("Page tree node without /Kids array");
                    continue;
                };
                // Reversed so the first kid is popped first
                for kid in kids.iter().rev() {
                    stack.push((kid.clone(), inherited.clone()));
                }
                continue;
            }

            if pages.len() >= max_pages {
                return Err(PDFError::limit(
                    LimitKind::MaxPages,
                    format!("document has more than {} pages", max_pages),
                ));
            }
            pages.push(Page::new(
                pages.len(),
                dict.clone(),
                reference,
                inherited.resources,
                inherited.media_box,
                inherited.crop_box,
                inherited.rotate.unwrap_or(0),
            ));
        }

        log::debug!("Page tree has {} pages", pages.len());
        Ok(pages)
    }

    /// Number of pages, by walking the tree.
    pub fn page_count(&self) -> PDFResult<usize> {
        Ok(self.pages(usize::MAX)?.len())
    }

    fn merge_inherited(&self, dict: &Dict, mut inherited: Inherited) -> PDFResult<Inherited> {
        if let Some(resources) = dict.get("Resources") {
            inherited.resources = Some(resources.clone());
        }
        let rect = |key: &str| -> PDFResult<Option<Rect>> {
            Ok(self
                .xref
                .get(dict, key)?
                .and_then(|v| v.as_number_array())
                .and_then(|v| Rect::from_slice(&v)))
        };
        if let Some(media_box) = rect("MediaBox")? {
            inherited.media_box = Some(media_box);
        }
        if let Some(crop_box) = rect("CropBox")? {
            inherited.crop_box = Some(crop_box);
        }
        if let Some(rotate) = self.xref.get(dict, "Rotate")?.and_then(|v| v.as_i64()) {
            inherited.rotate = Some(rotate);
        }
        Ok(inherited)
    }
}
