//! Synthetic PDF builder.
//!
//! Writes well-formed files from numbered objects: body, cross-reference
//! section (classic table or xref stream), trailer and `startxref`, with
//! optional incremental updates chained through `/Prev`.
//!
//! ```
//! use pdf_x_extract::fixture::PdfBuilder;
//!
//! let pdf = PdfBuilder::single_page("BT /F1 12 Tf 100 700 Td (Hello) Tj ET").build();
//! assert!(pdf.starts_with(b"%PDF-1.7"));
//! ```

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone)]
struct Object {
    generation: u32,
    body: Vec<u8>,
}

/// Objects packed into one object stream.
#[derive(Debug, Clone)]
struct ObjectStream {
    num: u32,
    members: Vec<(u32, String)>,
}

/// One body + cross-reference section.
#[derive(Debug, Clone, Default)]
struct Section {
    objects: BTreeMap<u32, Object>,
    object_streams: Vec<ObjectStream>,
    trailer: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct PdfBuilder {
    version: String,
    sections: Vec<Section>,
    xref_stream: bool,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        PdfBuilder {
            version: "1.7".to_string(),
            sections: vec![Section::default()],
            xref_stream: false,
        }
    }

    /// Catalog (1), page tree (2), Helvetica as `/F1` (5) and one page
    /// (10) drawing `content` (11).
    pub fn single_page(content: &str) -> Self {
        Self::with_pages(&[content])
    }

    /// Like [`single_page`](Self::single_page) with one page per content
    /// string. Pages are objects 10, 12, … and their contents 11, 13, ….
    pub fn with_pages(contents: &[&str]) -> Self {
        let kids: Vec<String> = (0..contents.len())
            .map(|i| format!("{} 0 R", 10 + 2 * i))
            .collect();
        let mut builder = PdfBuilder::new()
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(
                2,
                &format!(
                    "<< /Type /Pages /Kids [{}] /Count {} /MediaBox [0 0 612 792] \
                     /Resources << /Font << /F1 5 0 R >> >> >>",
                    kids.join(" "),
                    contents.len()
                ),
            )
            .object(
                5,
                "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
            )
            .root(1);
        for (i, content) in contents.iter().enumerate() {
            let page = 10 + 2 * i as u32;
            builder = builder
                .object(
                    page,
                    &format!("<< /Type /Page /Parent 2 0 R /Contents {} 0 R >>", page + 1),
                )
                .stream(page + 1, "", content.as_bytes());
        }
        builder
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Writes cross-reference streams instead of classic tables.
    pub fn xref_stream(mut self, enabled: bool) -> Self {
        self.xref_stream = enabled;
        self
    }

    /// Adds `num 0 obj <body> endobj` to the current section.
    pub fn object(self, num: u32, body: &str) -> Self {
        self.object_with_generation(num, 0, body)
    }

    pub fn object_with_generation(mut self, num: u32, generation: u32, body: &str) -> Self {
        self.current().objects.insert(
            num,
            Object {
                generation,
                body: body.as_bytes().to_vec(),
            },
        );
        self
    }

    /// Adds a stream object. `dict` holds extra entries; `/Length` is
    /// written from the data.
    pub fn stream(mut self, num: u32, dict: &str, data: &[u8]) -> Self {
        let mut body = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.current().objects.insert(num, Object { generation: 0, body });
        self
    }

    /// Adds a stream compressed with FlateDecode.
    pub fn flate_stream(self, num: u32, dict: &str, data: &[u8]) -> Self {
        let compressed = flate(data);
        self.stream(num, &format!("/Filter /FlateDecode {}", dict), &compressed)
    }

    /// Packs objects into object stream `num`.
    ///
    /// Only reachable through cross-reference streams, so this switches
    /// the builder to them.
    pub fn object_stream(mut self, num: u32, members: &[(u32, &str)]) -> Self {
        self.xref_stream = true;
        self.current().object_streams.push(ObjectStream {
            num,
            members: members.iter().map(|(n, b)| (*n, b.to_string())).collect(),
        });
        self
    }

    pub fn root(self, num: u32) -> Self {
        self.trailer_entry("Root", &format!("{} 0 R", num))
    }

    pub fn info(self, num: u32) -> Self {
        self.trailer_entry("Info", &format!("{} 0 R", num))
    }

    /// Adds a raw trailer entry to the current section.
    pub fn trailer_entry(mut self, key: &str, value: &str) -> Self {
        let trailer = &mut self.current().trailer;
        trailer.retain(|(k, _)| k != key);
        trailer.push((key.to_string(), value.to_string()));
        self
    }

    /// Starts an incremental update: following objects land in a new
    /// section whose trailer points back with `/Prev`.
    pub fn update(mut self) -> Self {
        let root = self.sections[0].trailer.iter().find(|(k, _)| k == "Root").cloned();
        let mut section = Section::default();
        section.trailer.extend(root);
        self.sections.push(section);
        self
    }

    fn current(&mut self) -> &mut Section {
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }

    fn max_object_number(&self) -> u32 {
        self.sections
            .iter()
            .flat_map(|s| {
                s.objects.keys().copied().chain(
                    s.object_streams
                        .iter()
                        .flat_map(|os| std::iter::once(os.num).chain(os.members.iter().map(|m| m.0))),
                )
            })
            .max()
            .unwrap_or(0)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n%\u{e2}\u{e3}\u{cf}\u{d3}\n", self.version).into_bytes();
        let mut prev: Option<usize> = None;
        let mut next_xref_num = self.max_object_number() + 1;

        for (index, section) in self.sections.iter().enumerate() {
            // num → (type, field2, field3): 1 = (offset, gen), 2 = (stream, index)
            let mut entries: BTreeMap<u32, (u8, u64, u64)> = BTreeMap::new();
            if index == 0 {
                entries.insert(0, (0, 0, 65535));
            }

            for (num, object) in &section.objects {
                entries.insert(*num, (1, out.len() as u64, object.generation as u64));
                out.extend_from_slice(format!("{} {} obj\n", num, object.generation).as_bytes());
                out.extend_from_slice(&object.body);
                out.extend_from_slice(b"\nendobj\n");
            }

            for object_stream in &section.object_streams {
                let mut header = String::new();
                let mut body = String::new();
                for (i, (num, text)) in object_stream.members.iter().enumerate() {
                    header.push_str(&format!("{} {} ", num, body.len()));
                    body.push_str(text);
                    body.push('\n');
                    entries.insert(*num, (2, object_stream.num as u64, i as u64));
                }
                let mut data = header.into_bytes();
                let first = data.len();
                data.extend_from_slice(body.as_bytes());
                let compressed = flate(&data);

                entries.insert(object_stream.num, (1, out.len() as u64, 0));
                out.extend_from_slice(
                    format!(
                        "{} 0 obj\n<< /Type /ObjStm /N {} /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
                        object_stream.num,
                        object_stream.members.len(),
                        first,
                        compressed.len()
                    )
                    .as_bytes(),
                );
                out.extend_from_slice(&compressed);
                out.extend_from_slice(b"\nendstream\nendobj\n");
            }

            let mut trailer: Vec<String> = section
                .trailer
                .iter()
                .map(|(k, v)| format!("/{} {}", k, v))
                .collect();
            if let Some(prev) = prev {
                trailer.push(format!("/Prev {}", prev));
            }

            let xref_offset = out.len();
            if self.xref_stream {
                let xref_num = next_xref_num;
                next_xref_num += 1;
                entries.insert(xref_num, (1, xref_offset as u64, 0));
                trailer.push(format!("/Size {}", next_xref_num));
                self.write_xref_stream(&mut out, xref_num, &entries, &trailer);
            } else {
                trailer.push(format!("/Size {}", next_xref_num));
                write_xref_table(&mut out, &entries);
                out.extend_from_slice(format!("trailer\n<< {} >>\n", trailer.join(" ")).as_bytes());
            }
            out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
            prev = Some(xref_offset);
        }
        out
    }

    fn write_xref_stream(
        &self,
        out: &mut Vec<u8>,
        num: u32,
        entries: &BTreeMap<u32, (u8, u64, u64)>,
        trailer: &[String],
    ) {
        let mut rows = Vec::new();
        for (kind, field2, field3) in entries.values() {
            rows.push(*kind);
            rows.extend_from_slice(&(*field2 as u32).to_be_bytes());
            rows.extend_from_slice(&(*field3 as u16).to_be_bytes());
        }
        let index: Vec<String> = subsections(entries.keys().copied())
            .into_iter()
            .map(|(start, count)| format!("{} {}", start, count))
            .collect();
        out.extend_from_slice(
            format!(
                "{} 0 obj\n<< /Type /XRef /W [1 4 2] /Index [{}] {} /Length {} >>\nstream\n",
                num,
                index.join(" "),
                trailer.join(" "),
                rows.len()
            )
            .as_bytes(),
        );
        out.extend_from_slice(&rows);
        out.extend_from_slice(b"\nendstream\nendobj\n");
    }
}

fn write_xref_table(out: &mut Vec<u8>, entries: &BTreeMap<u32, (u8, u64, u64)>) {
    out.extend_from_slice(b"xref\n");
    let mut iter = entries.iter().peekable();
    for (start, count) in subsections(entries.keys().copied()) {
        out.extend_from_slice(format!("{} {}\n", start, count).as_bytes());
        for _ in 0..count {
            let Some((_, (kind, field2, field3))) = iter.next() else {
                break;
            };
            let marker = if *kind == 0 { 'f' } else { 'n' };
            out.extend_from_slice(format!("{:010} {:05} {} \n", field2, field3, marker).as_bytes());
        }
    }
}

/// Groups sorted object numbers into `(start, count)` runs.
fn subsections(nums: impl Iterator<Item = u32>) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for num in nums {
        match runs.last_mut() {
            Some((start, count)) if *start + *count == num => *count += 1,
            _ => runs.push((num, 1)),
        }
    }
    runs
}

/// zlib-compresses `data`.
pub fn flate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}
