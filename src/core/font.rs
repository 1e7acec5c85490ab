//! Fonts for text extraction.
//!
//! A [`Font`] splits shown strings into character codes, maps every code to
//! Unicode and reports glyph advances in text space. Glyph outlines are never
//! loaded.
//!
//! Unicode lookup order: `/ToUnicode`, then the font encoding
//! (`/Differences` over the base encoding), then a fallback that keeps the
//! character (Latin-1 for single bytes, the code point for multi-byte codes).

use super::cmap::CMap;
use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::encoding::{BaseEncoding, glyph_to_char};
use super::error::PDFResult;
use super::parser::{Dict, PDFObject};
use super::xref::XRef;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Width used when a font gives no metrics for a glyph (1/1000 em).
const DEFAULT_GLYPH_WIDTH: f64 = 500.0;

/// Font category, from `/Subtype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// Type1, MMType1, TrueType and unknown simple fonts
    Simple,
    /// User-defined glyphs with their own `/FontMatrix`
    Type3,
    /// Type0 with a CIDFont descendant
    Composite,
}

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub code: u32,
    /// Unicode text for the code; usually one char, more for ligatures
    pub text: SmallVec<[char; 2]>,
    /// Horizontal advance in text space units (before font size)
    pub width: f64,
    /// Single-byte code 32, the only code word spacing applies to
    pub is_word_space: bool,
}

/// Glyph widths keyed by code (simple fonts) or CID (composite fonts).
#[derive(Debug, Clone, Default)]
struct Widths {
    explicit: FxHashMap<u32, f64>,
    default: f64,
}

impl Widths {
    fn get(&self, key: u32) -> f64 {
        self.explicit.get(&key).copied().unwrap_or(self.default)
    }
}

/// A font prepared for text extraction.
#[derive(Debug, Clone)]
pub struct Font {
    name: String,
    kind: FontKind,

    /// Code → Unicode from `/ToUnicode`
    to_unicode: Option<CMap>,

    /// Simple fonts: code → char from encoding and `/Differences`
    encoding: Box<[Option<char>; 256]>,

    /// Composite fonts: code splitting and code → CID
    cmap: Option<CMap>,

    widths: Widths,

    /// Glyph space units per text space unit (1000 except for Type3)
    units_per_em: f64,

    /// Ascent and descent in text space units
    ascent: f64,
    descent: f64,
}

impl Font {
    /// Loads a font from its resource dictionary.
    ///
    /// Problems with optional parts (ToUnicode, widths, descriptors) are
    /// recorded and the font stays usable.
    pub fn load(dict: &Dict, xref: &XRef, diagnostics: &mut Diagnostics) -> PDFResult<Font> {
        let subtype = dict.get("Subtype").and_then(PDFObject::as_name).unwrap_or("Type1");
        let name = dict
            .get("BaseFont")
            .and_then(PDFObject::as_name)
            .unwrap_or(subtype)
            .to_string();

        let to_unicode = match xref.get(dict, "ToUnicode") {
            Ok(Some(PDFObject::Stream { dict: cmap_dict, data })) => {
                match xref
                    .decode_stream(&cmap_dict, &data)
                    .and_then(|decoded| decoded.into_data())
                    .and_then(|bytes| CMap::parse(&bytes))
                {
                    Ok(cmap) => Some(cmap),
                    Err(e) if e.aborts_page() => return Err(e),
                    Err(e) => {
                        diagnostics.record_error(&format!("ToUnicode of font {}", name), &e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) if e.aborts_page() => return Err(e),
            Err(e) => {
                diagnostics.record_error(&format!("ToUnicode of font {}", name), &e);
                None
            }
        };

        let mut font = Font {
            name,
            kind: FontKind::Simple,
            to_unicode,
            encoding: Box::new([None; 256]),
            cmap: None,
            widths: Widths {
                explicit: FxHashMap::default(),
                default: DEFAULT_GLYPH_WIDTH,
            },
            units_per_em: 1000.0,
            ascent: 0.8,
            descent: -0.2,
        };

        match subtype {
            "Type0" => font.load_composite(dict, xref, diagnostics)?,
            "Type3" => {
                font.kind = FontKind::Type3;
                font.load_simple(dict, xref, subtype)?;
                if let Some(matrix) = xref.get(dict, "FontMatrix")?.and_then(|m| m.as_number_array()) {
                    if let Some(&a) = matrix.first().filter(|a| a.abs() > 1e-9) {
                        font.units_per_em = 1.0 / a;
                    }
                }
            }
            _ => font.load_simple(dict, xref, subtype)?,
        }

        log::debug!(
            "Loaded font {} ({:?}, tounicode: {})",
            font.name,
            font.kind,
            font.to_unicode.is_some()
        );
        Ok(font)
    }

    /// Latin-1 font used when a font resource is missing.
    pub fn fallback(name: &str) -> Font {
        let mut encoding = Box::new([None; 256]);
        for (code, slot) in encoding.iter_mut().enumerate() {
            *slot = Some(char::from(code as u8));
        }
        Font {
            name: name.to_string(),
            kind: FontKind::Simple,
            to_unicode: None,
            encoding,
            cmap: None,
            widths: Widths {
                explicit: FxHashMap::default(),
                default: DEFAULT_GLYPH_WIDTH,
            },
            units_per_em: 1000.0,
            ascent: 0.8,
            descent: -0.2,
        }
    }

    fn load_simple(&mut self, dict: &Dict, xref: &XRef, subtype: &str) -> PDFResult<()> {
        let default_base = if subtype == "TrueType" {
            BaseEncoding::WinAnsi
        } else {
            BaseEncoding::Standard
        };

        let (base, differences) = match xref.get(dict, "Encoding")? {
            Some(PDFObject::Name(name)) => (BaseEncoding::from_name(&name).unwrap_or(default_base), None),
            Some(PDFObject::Dictionary(enc)) => {
                let base = xref
                    .get(&enc, "BaseEncoding")?
                    .and_then(|b| b.as_name().and_then(BaseEncoding::from_name))
                    .unwrap_or(default_base);
                (base, xref.get(&enc, "Differences")?)
            }
            _ => (default_base, None),
        };

        for (code, slot) in self.encoding.iter_mut().enumerate() {
            *slot = base.decode(code as u8);
        }
        if let Some(PDFObject::Array(items)) = differences {
            apply_differences(&mut self.encoding, &items);
        }

        let descriptor = match xref.get(dict, "FontDescriptor")? {
            Some(PDFObject::Dictionary(d)) => Some(d),
            _ => None,
        };
        if let Some(descriptor) = &descriptor {
            self.read_descriptor(descriptor, xref)?;
        }
        if is_fixed_pitch(&self.name) {
            self.widths.default = 600.0;
        }

        // An out-of-range /FirstChar leaves every width at the default.
        let first_char = match xref.get(dict, "FirstChar")?.and_then(|f| f.as_i64()) {
            Some(f) => u32::try_from(f.max(0)).ok(),
            None => Some(0),
        };
        if let (Some(first_char), Some(PDFObject::Array(widths))) =
            (first_char, xref.get(dict, "Widths")?)
        {
            for (i, w) in widths.iter().enumerate() {
                let Some(code) = offset_code(first_char, i) else {
                    break;
                };
                if let Some(w) = xref.fetch_if_ref(w)?.as_number() {
                    self.widths.explicit.insert(code, w);
                }
            }
        }
        Ok(())
    }

    fn read_descriptor(&mut self, descriptor: &Dict, xref: &XRef) -> PDFResult<()> {
        let number = |key: &str| -> PDFResult<Option<f64>> {
            Ok(xref.get(descriptor, key)?.and_then(|v| v.as_number()))
        };
        if let Some(w) = number("MissingWidth")? {
            if w > 0.0 {
                self.widths.default = w;
            }
        }
        match (number("Ascent")?, number("Descent")?) {
            (Some(a), Some(d)) if a > d && a != 0.0 => {
                self.ascent = a / 1000.0;
                self.descent = d.min(0.0) / 1000.0;
            }
            _ => {}
        }
        Ok(())
    }

    fn load_composite(
        &mut self,
        dict: &Dict,
        xref: &XRef,
        diagnostics: &mut Diagnostics,
    ) -> PDFResult<()> {
        self.kind = FontKind::Composite;
        self.widths.default = 1000.0;

        let cmap = match xref.get(dict, "Encoding")? {
            Some(PDFObject::Name(name)) => CMap::predefined(&name).unwrap_or_else(|| {
                diagnostics.record(
                    DiagnosticKind::MissingFont,
                    format!("font {} uses unknown CMap {}, assuming Identity-H", self.name, name),
                );
                CMap::identity(false)
            }),
            Some(PDFObject::Stream { dict: cmap_dict, data }) => {
                match xref
                    .decode_stream(&cmap_dict, &data)
                    .and_then(|decoded| decoded.into_data())
                    .and_then(|bytes| CMap::parse(&bytes))
                {
                    Ok(cmap) => cmap,
                    Err(e) if e.aborts_page() => return Err(e),
                    Err(e) => {
                        diagnostics.record_error(&format!("encoding CMap of font {}", self.name), &e);
                        CMap::identity(false)
                    }
                }
            }
            _ => CMap::identity(false),
        };
        self.cmap = Some(cmap);

        let descendant = match xref.get(dict, "DescendantFonts")? {
            Some(PDFObject::Array(items)) => match items.first() {
                Some(first) => xref.fetch_if_ref(first)?,
                None => PDFObject::Null,
            },
            Some(other) => other,
            None => PDFObject::Null,
        };
        let Some(descendant) = descendant.as_dict() else {
            diagnostics.record(
                DiagnosticKind::MissingFont,
                format!("font {} has no usable DescendantFonts", self.name),
            );
            return Ok(());
        };

        if let Some(dw) = xref.get(descendant, "DW")?.and_then(|v| v.as_number()) {
            self.widths.default = dw;
        }
        if let Some(PDFObject::Dictionary(fd)) = xref.get(descendant, "FontDescriptor")? {
            let default_width = self.widths.default;
            self.read_descriptor(&fd, xref)?;
            // MissingWidth does not apply to CIDFonts; /DW does
            self.widths.default = default_width;
        }
        if let Some(PDFObject::Array(w)) = xref.get(descendant, "W")? {
            let resolved: Vec<PDFObject> = w
                .iter()
                .map(|item| xref.fetch_if_ref(item))
                .collect::<PDFResult<_>>()?;
            parse_cid_widths(&resolved, &mut self.widths.explicit);
        }
        Ok(())
    }

    /// Splits a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let mut glyphs = Vec::with_capacity(bytes.len());
        let mut pos = 0;

        while pos < bytes.len() {
            let (code, len) = match &self.cmap {
                Some(cmap) => cmap.read_code(bytes, pos),
                None => (bytes[pos] as u32, 1),
            };
            pos += len;

            let width_key = match &self.cmap {
                Some(cmap) => cmap.to_cid(code),
                None => code,
            };
            glyphs.push(Glyph {
                code,
                text: self.unicode_for(code, len),
                width: self.widths.get(width_key) / self.units_per_em,
                is_word_space: len == 1 && code == 32,
            });
        }
        glyphs
    }

    fn unicode_for(&self, code: u32, len: usize) -> SmallVec<[char; 2]> {
        if let Some(text) = self.to_unicode.as_ref().and_then(|c| c.to_unicode(code)) {
            if !text.is_empty() {
                return text.chars().collect();
            }
        }
        if self.cmap.is_none() {
            if let Some(c) = self.encoding[code as usize & 0xFF] {
                return SmallVec::from_elem(c, 1);
            }
        }
        let fallback = if len == 1 {
            char::from(code as u8)
        } else {
            char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
        };
        SmallVec::from_elem(fallback, 1)
    }

    /// Returns the base font name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FontKind {
        self.kind
    }

    /// True when the font writes top to bottom.
    pub fn is_vertical(&self) -> bool {
        self.cmap.as_ref().is_some_and(CMap::is_vertical)
    }

    /// Ascent in text space units per unit font size.
    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    /// Descent (negative) in text space units per unit font size.
    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn has_to_unicode(&self) -> bool {
        self.to_unicode.is_some()
    }
}

fn is_fixed_pitch(name: &str) -> bool {
    // Subset fonts carry a "ABCDEF+" prefix
    let base = name.split_once('+').map_or(name, |(_, rest)| rest);
    base.starts_with("Courier")
}

/// Applies `/Differences [code /name /name code /name ...]`.
fn apply_differences(encoding: &mut [Option<char>; 256], items: &[PDFObject]) {
    let mut code: usize = 0;
    for item in items {
        match item {
            PDFObject::Integer(n) => code = (*n).clamp(0, 255) as usize,
            PDFObject::Name(glyph) => {
                if code < 256 {
                    if let Some(c) = glyph_to_char(glyph) {
                        encoding[code] = Some(c);
                    }
                }
                code += 1;
            }
            _ => {}
        }
    }
}

/// `first + offset`, or None once the code leaves the `u32` range.
fn offset_code(first: u32, offset: usize) -> Option<u32> {
    u32::try_from(offset).ok().and_then(|o| first.checked_add(o))
}

/// Parses a CIDFont `/W` array: `c [w1 w2 ...]` or `c_first c_last w`.
fn parse_cid_widths(items: &[PDFObject], widths: &mut FxHashMap<u32, f64>) {
    let mut i = 0;
    while i < items.len() {
        let Some(first) = items[i].as_i64().and_then(|f| u32::try_from(f).ok()) else {
            i += 1;
            continue;
        };
        match items.get(i + 1) {
            Some(PDFObject::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    let Some(cid) = offset_code(first, offset) else {
                        break;
                    };
                    if let Some(w) = w.as_number() {
                        widths.insert(cid, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let last = last.as_i64().and_then(|l| u32::try_from(l).ok());
                let width = items.get(i + 2).and_then(PDFObject::as_number);
                if let (Some(last), Some(width)) = (last, width) {
                    for cid in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(cid, width);
                    }
                }
                i += 3;
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::Stream;

    fn empty_xref() -> XRef {
        XRef::new(Stream::from_bytes(Vec::new()), usize::MAX / 2)
    }

    fn name(n: &str) -> PDFObject {
        PDFObject::Name(n.to_string())
    }

    fn font_dict(entries: Vec<(&str, PDFObject)>) -> Dict {
        entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn text(glyphs: &[Glyph]) -> String {
        glyphs.iter().flat_map(|g| g.text.iter()).collect()
    }

    #[test]
    fn test_simple_font_standard_encoding() {
        let dict = font_dict(vec![("Subtype", name("Type1")), ("BaseFont", name("Helvetica"))]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();

        let glyphs = font.decode(b"Hi there");
        assert_eq!(text(&glyphs), "Hi there");
        assert_eq!(glyphs[0].width, 0.5);
        assert!(glyphs[2].is_word_space);
        assert_eq!(font.kind(), FontKind::Simple);
    }

    #[test]
    fn test_differences_and_widths() {
        let encoding = font_dict(vec![
            ("BaseEncoding", name("WinAnsiEncoding")),
            (
                "Differences",
                PDFObject::Array(vec![PDFObject::Integer(65), name("eacute"), name("fi")]),
            ),
        ]);
        let dict = font_dict(vec![
            ("Subtype", name("TrueType")),
            ("BaseFont", name("Arial")),
            ("Encoding", PDFObject::Dictionary(encoding)),
            ("FirstChar", PDFObject::Integer(65)),
            (
                "Widths",
                PDFObject::Array(vec![PDFObject::Integer(611), PDFObject::Integer(556)]),
            ),
        ]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();

        let glyphs = font.decode(b"ABC\x80");
        assert_eq!(text(&glyphs), "é\u{FB01}C€");
        assert_eq!(glyphs[0].width, 0.611);
        assert_eq!(glyphs[1].width, 0.556);
        assert_eq!(glyphs[2].width, 0.5);
    }

    #[test]
    fn test_courier_is_monospaced() {
        let dict = font_dict(vec![("Subtype", name("Type1")), ("BaseFont", name("ABCDEF+Courier-Bold"))]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();
        assert_eq!(font.decode(b"i")[0].width, 0.6);
    }

    #[test]
    fn test_undefined_code_falls_back_to_latin1() {
        let dict = font_dict(vec![("Subtype", name("Type1")), ("Encoding", name("StandardEncoding"))]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();
        // 0xE4 is undefined in StandardEncoding
        assert_eq!(text(&font.decode(&[0xE4])), "ä");
    }

    #[test]
    fn test_type0_identity_with_widths() {
        let descendant = font_dict(vec![
            ("Subtype", name("CIDFontType2")),
            ("DW", PDFObject::Integer(1000)),
            (
                "W",
                PDFObject::Array(vec![
                    PDFObject::Integer(1),
                    PDFObject::Array(vec![PDFObject::Integer(250), PDFObject::Integer(300)]),
                    PDFObject::Integer(10),
                    PDFObject::Integer(12),
                    PDFObject::Integer(400),
                ]),
            ),
        ]);
        let dict = font_dict(vec![
            ("Subtype", name("Type0")),
            ("BaseFont", name("NotoSans")),
            ("Encoding", name("Identity-H")),
            ("DescendantFonts", PDFObject::Array(vec![PDFObject::Dictionary(descendant)])),
        ]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();

        let glyphs = font.decode(&[0x00, 0x01, 0x00, 0x02, 0x00, 0x0B, 0x00, 0x41]);
        assert_eq!(glyphs.len(), 4);
        assert_eq!(glyphs[0].width, 0.25);
        assert_eq!(glyphs[1].width, 0.3);
        assert_eq!(glyphs[2].width, 0.4);
        assert_eq!(glyphs[3].width, 1.0);
        // Without ToUnicode the code point itself is used
        assert_eq!(glyphs[3].text.as_slice(), &['A']);
        assert!(!glyphs[0].is_word_space);
    }

    #[test]
    fn test_unknown_cmap_is_recorded() {
        let dict = font_dict(vec![("Subtype", name("Type0")), ("Encoding", name("UniJIS-UCS2-H"))]);
        let mut diagnostics = Diagnostics::default();
        let font = Font::load(&dict, &empty_xref(), &mut diagnostics).unwrap();
        assert_eq!(font.kind(), FontKind::Composite);
        assert!(diagnostics.iter().all(|d| d.kind == DiagnosticKind::MissingFont));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn test_type3_font_matrix_scales_widths() {
        let dict = font_dict(vec![
            ("Subtype", name("Type3")),
            (
                "FontMatrix",
                PDFObject::Array(vec![
                    PDFObject::Real(0.01),
                    PDFObject::Integer(0),
                    PDFObject::Integer(0),
                    PDFObject::Real(0.01),
                    PDFObject::Integer(0),
                    PDFObject::Integer(0),
                ]),
            ),
            ("FirstChar", PDFObject::Integer(97)),
            ("Widths", PDFObject::Array(vec![PDFObject::Integer(50)])),
        ]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();
        assert_eq!(font.kind(), FontKind::Type3);
        assert_eq!(font.decode(b"a")[0].width, 0.5);
    }

    #[test]
    fn test_widths_past_the_last_code_are_dropped() {
        let dict = font_dict(vec![
            ("Subtype", name("Type1")),
            ("FirstChar", PDFObject::Integer(u32::MAX as i64)),
            (
                "Widths",
                PDFObject::Array(vec![PDFObject::Integer(700), PDFObject::Integer(800)]),
            ),
        ]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();
        assert_eq!(font.decode(b"A")[0].width, 0.5);

        let dict = font_dict(vec![
            ("Subtype", name("Type1")),
            ("FirstChar", PDFObject::Integer(1 << 40)),
            ("Widths", PDFObject::Array(vec![PDFObject::Integer(700)])),
        ]);
        let font = Font::load(&dict, &empty_xref(), &mut Diagnostics::default()).unwrap();
        assert_eq!(font.decode(b"\0")[0].width, 0.5);
    }

    #[test]
    fn test_cid_widths_stop_at_the_last_cid() {
        let mut widths = FxHashMap::default();
        parse_cid_widths(
            &[
                PDFObject::Integer(u32::MAX as i64),
                PDFObject::Array(vec![PDFObject::Integer(250), PDFObject::Integer(300)]),
            ],
            &mut widths,
        );
        assert_eq!(widths.len(), 1);
        assert_eq!(widths.get(&u32::MAX), Some(&250.0));
    }

    #[test]
    fn test_fallback_font() {
        let font = Font::fallback("F9");
        assert_eq!(text(&font.decode(&[0x48, 0xE9])), "Hé");
        assert_eq!(font.name(), "F9");
    }
}
