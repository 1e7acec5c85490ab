//! CMap (Character Map) parsing.
//!
//! A CMap splits a byte string into character codes (codespace ranges) and
//! maps codes either to Unicode (`bfchar`/`bfrange`, used by `/ToUnicode`)
//! or to CIDs (`cidchar`/`cidrange`, used by a Type0 font's `/Encoding`).
//!
//! Example CMap stream:
//! ```text
//! /CIDInit /ProcSet findresource begin
//! 12 dict begin
//! begincmap
//! /CMapName /Adobe-Identity-UCS def
//! 1 begincodespacerange
//! <0000> <FFFF>
//! endcodespacerange
//! 2 beginbfchar
//! <0003> <0020>
//! <0005> <0041>
//! endbfchar
//! 1 beginbfrange
//! <0010> <0020> <0030>
//! endbfrange
//! endcmap
//! ```

use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use super::stream::Stream;
use rustc_hash::FxHashMap;

/// Largest number of codes one `bfrange`/`cidrange` line may expand to.
const MAX_RANGE_SPAN: u32 = 0x10000;

/// One `begincodespacerange` entry: codes of `len` bytes in `low..=high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CodespaceRange {
    len: usize,
    low: u32,
    high: u32,
}

/// Character map for a font.
#[derive(Debug, Clone, Default)]
pub struct CMap {
    codespace: Vec<CodespaceRange>,

    /// Code → Unicode text (a code may map to several characters)
    unicode: FxHashMap<u32, String>,

    /// Code → CID for single codes
    cids: FxHashMap<u32, u32>,

    /// (low, high, first CID)
    cid_ranges: Vec<(u32, u32, u32)>,

    /// Code equals CID (Identity-H / Identity-V)
    identity: bool,

    vertical: bool,
}

impl CMap {
    /// Creates an empty CMap.
    pub fn new() -> Self {
        Self::default()
    }

    /// The predefined two-byte identity CMap.
    pub fn identity(vertical: bool) -> Self {
        CMap {
            codespace: vec![CodespaceRange {
                len: 2,
                low: 0,
                high: 0xFFFF,
            }],
            identity: true,
            vertical,
            ..Self::default()
        }
    }

    /// Returns the predefined CMap for `name`, if it is one we know.
    pub fn predefined(name: &str) -> Option<Self> {
        match name {
            "Identity-H" => Some(Self::identity(false)),
            "Identity-V" => Some(Self::identity(true)),
            _ => None,
        }
    }

    /// Parses a CMap program.
    ///
    /// Malformed entries are skipped. When the program declares no codespace
    /// ranges, they are inferred from the source code lengths.
    pub fn parse(data: &[u8]) -> PDFResult<Self> {
        let mut cmap = CMap::new();
        let mut lexer = Lexer::new(Box::new(Stream::from_bytes(data.to_vec())))?;
        let mut inferred = Vec::new();
        let mut last_name: Option<String> = None;

        loop {
            let token = match lexer.get_object() {
                Ok(Token::EOF) => break,
                Ok(token) => token,
                Err(PDFError::Syntax(message)) => {
                    log::debug!("Skipping bad CMap token: {}", message);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match token {
                Token::Command(cmd) => match cmd.as_str() {
                    "begincodespacerange" => cmap.parse_codespace(&mut lexer)?,
                    "beginbfchar" => cmap.parse_bfchar(&mut lexer, &mut inferred)?,
                    "beginbfrange" => cmap.parse_bfrange(&mut lexer, &mut inferred)?,
                    "begincidchar" => cmap.parse_cidchar(&mut lexer, &mut inferred)?,
                    "begincidrange" => cmap.parse_cidrange(&mut lexer, &mut inferred)?,
                    "usecmap" => {
                        if let Some(base) = last_name.as_deref().and_then(CMap::predefined) {
                            cmap.identity = base.identity;
                            cmap.codespace.extend(base.codespace);
                        }
                    }
                    _ => {}
                },
                Token::Name(name) => {
                    if name == "WMode" {
                        if let Ok(Token::Integer(mode)) = lexer.get_object() {
                            cmap.vertical = mode == 1;
                        }
                    }
                    last_name = Some(name);
                }
                _ => {}
            }
        }

        if cmap.codespace.is_empty() {
            inferred.sort_unstable();
            inferred.dedup();
            cmap.codespace = inferred
                .into_iter()
                .map(|len| CodespaceRange {
                    len,
                    low: 0,
                    high: max_code(len),
                })
                .collect();
        }

        Ok(cmap)
    }

    fn parse_codespace(&mut self, lexer: &mut Lexer) -> PDFResult<()> {
        while let Some([low, high]) = read_entries::<2>(lexer, "endcodespacerange")? {
            if let (Some(low_bytes), Some(high_bytes)) = (low.hex(), high.hex()) {
                self.codespace.push(CodespaceRange {
                    len: high_bytes.len().clamp(1, 4),
                    low: code_value(low_bytes),
                    high: code_value(high_bytes),
                });
            }
        }
        Ok(())
    }

    fn parse_bfchar(&mut self, lexer: &mut Lexer, inferred: &mut Vec<usize>) -> PDFResult<()> {
        while let Some([src, dst]) = read_entries::<2>(lexer, "endbfchar")? {
            let Some(src) = src.hex() else { continue };
            inferred.push(src.len().clamp(1, 4));
            let text = match &dst {
                Entry::Hex(bytes) => utf16be_to_string(bytes),
                Entry::Name(name) => match super::encoding::glyph_to_char(name) {
                    Some(c) => c.to_string(),
                    None => continue,
                },
                _ => continue,
            };
            self.unicode.insert(code_value(src), text);
        }
        Ok(())
    }

    fn parse_bfrange(&mut self, lexer: &mut Lexer, inferred: &mut Vec<usize>) -> PDFResult<()> {
        while let Some([low, high, dst]) = read_entries::<3>(lexer, "endbfrange")? {
            let (Some(low), Some(high)) = (low.hex(), high.hex()) else {
                continue;
            };
            inferred.push(low.len().clamp(1, 4));
            let (low, high) = (code_value(low), code_value(high));
            if high < low || high - low >= MAX_RANGE_SPAN {
                log::debug!("Skipping bfrange <{:X}> <{:X}>", low, high);
                continue;
            }

            match dst {
                Entry::Hex(bytes) => {
                    let mut units = utf16_units(&bytes);
                    for code in low..=high {
                        self.unicode
                            .insert(code, String::from_utf16_lossy(&units));
                        if let Some(last) = units.last_mut() {
                            *last = last.wrapping_add(1);
                        }
                    }
                }
                Entry::Array(items) => {
                    for (code, item) in (low..=high).zip(items) {
                        self.unicode.insert(code, utf16be_to_string(&item));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_cidchar(&mut self, lexer: &mut Lexer, inferred: &mut Vec<usize>) -> PDFResult<()> {
        while let Some([src, cid]) = read_entries::<2>(lexer, "endcidchar")? {
            if let (Some(src), Entry::Int(cid)) = (src.hex(), cid) {
                inferred.push(src.len().clamp(1, 4));
                self.cids.insert(code_value(src), cid);
            }
        }
        Ok(())
    }

    fn parse_cidrange(&mut self, lexer: &mut Lexer, inferred: &mut Vec<usize>) -> PDFResult<()> {
        while let Some([low, high, cid]) = read_entries::<3>(lexer, "endcidrange")? {
            if let (Some(low), Some(high), Entry::Int(cid)) = (low.hex(), high.hex(), cid) {
                inferred.push(low.len().clamp(1, 4));
                let (low, high) = (code_value(low), code_value(high));
                if low <= high {
                    self.cid_ranges.push((low, high, cid));
                }
            }
        }
        Ok(())
    }

    /// Reads one character code starting at `pos`.
    ///
    /// Returns the code and its byte length. Bytes that match no codespace
    /// range are consumed one at a time.
    pub fn read_code(&self, bytes: &[u8], pos: usize) -> (u32, usize) {
        let mut code = 0u32;
        for len in 1..=4 {
            let Some(&byte) = bytes.get(pos + len - 1) else {
                break;
            };
            code = (code << 8) | byte as u32;
            if self
                .codespace
                .iter()
                .any(|r| r.len == len && r.low <= code && code <= r.high)
            {
                return (code, len);
            }
        }
        (bytes.get(pos).copied().unwrap_or(0) as u32, 1)
    }

    /// Maps a code to Unicode text.
    pub fn to_unicode(&self, code: u32) -> Option<&str> {
        self.unicode.get(&code).map(String::as_str)
    }

    /// Maps a code to a CID (identity when unmapped).
    pub fn to_cid(&self, code: u32) -> u32 {
        if self.identity {
            return code;
        }
        if let Some(&cid) = self.cids.get(&code) {
            return cid;
        }
        self.cid_ranges
            .iter()
            .find(|(low, high, _)| *low <= code && code <= *high)
            .map(|(low, _, cid)| cid + (code - low))
            .unwrap_or(code)
    }

    /// True for vertical writing mode (`/WMode 1`, Identity-V).
    pub fn is_vertical(&self) -> bool {
        self.vertical
    }

    /// Returns the number of Unicode mappings.
    pub fn len(&self) -> usize {
        self.unicode.len()
    }

    /// Returns true if this CMap has no Unicode mappings.
    pub fn is_empty(&self) -> bool {
        self.unicode.is_empty()
    }
}

/// Operand of a CMap entry.
#[derive(Debug)]
enum Entry {
    Hex(Vec<u8>),
    Int(u32),
    Name(String),
    Array(Vec<Vec<u8>>),
    Other,
}

impl Entry {
    fn hex(&self) -> Option<&[u8]> {
        match self {
            Entry::Hex(bytes) if !bytes.is_empty() => Some(bytes),
            _ => None,
        }
    }
}

/// Reads `N` operands, or None once `end` (or EOF) is reached.
fn read_entries<const N: usize>(lexer: &mut Lexer, end: &str) -> PDFResult<Option<[Entry; N]>> {
    let mut entries: [Entry; N] = std::array::from_fn(|_| Entry::Other);
    for slot in entries.iter_mut() {
        *slot = match next_token(lexer)? {
            Token::EOF => return Ok(None),
            Token::Command(cmd) if cmd == end => return Ok(None),
            Token::String(bytes) | Token::HexString(bytes) => Entry::Hex(bytes),
            Token::Integer(i) => Entry::Int(u32::try_from(i).unwrap_or(0)),
            Token::Name(name) => Entry::Name(name),
            Token::ArrayStart => {
                let mut items = Vec::new();
                loop {
                    match next_token(lexer)? {
                        Token::String(bytes) | Token::HexString(bytes) => items.push(bytes),
                        Token::ArrayEnd | Token::EOF => break,
                        _ => {}
                    }
                }
                Entry::Array(items)
            }
            _ => Entry::Other,
        };
    }
    Ok(Some(entries))
}

fn next_token(lexer: &mut Lexer) -> PDFResult<Token> {
    loop {
        match lexer.get_object() {
            Err(PDFError::Syntax(message)) => log::debug!("Skipping bad CMap token: {}", message),
            other => return other,
        }
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn max_code(len: usize) -> u32 {
    if len >= 4 { u32::MAX } else { (1u32 << (8 * len)) - 1 }
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() % 2 == 1 {
        return bytes.iter().map(|&b| b as u16).collect();
    }
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

fn utf16be_to_string(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}
