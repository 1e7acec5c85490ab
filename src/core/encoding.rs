//! Single-byte font encodings, glyph names and PDF text strings.
//!
//! Tables hold Unicode code points, with 0 marking an undefined code.

/// Base encodings a simple font can name in `/Encoding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    PdfDoc,
}

impl BaseEncoding {
    /// Maps an `/Encoding` or `/BaseEncoding` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(BaseEncoding::Standard),
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            "PDFDocEncoding" => Some(BaseEncoding::PdfDoc),
            _ => None,
        }
    }

    /// Decodes one byte, or None when the encoding leaves it undefined.
    pub fn decode(self, code: u8) -> Option<char> {
        let cp = match self {
            BaseEncoding::Standard => standard(code),
            BaseEncoding::WinAnsi => win_ansi(code),
            BaseEncoding::MacRoman => mac_roman(code),
            BaseEncoding::PdfDoc => pdf_doc(code),
        };
        if cp == 0 { None } else { char::from_u32(cp as u32) }
    }
}

const WIN_ANSI_HIGH: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

const PDF_DOC_LOW: [u16; 8] = [0x02D8, 0x02C7, 0x02C6, 0x02D9, 0x02DD, 0x02DB, 0x02DA, 0x02DC];

const PDF_DOC_HIGH: [u16; 33] = [
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203A, 0x2212,
    0x2030, 0x201E, 0x201C, 0x201D, 0x2018, 0x2019, 0x201A, 0x2122, 0xFB01, 0xFB02, 0x0141,
    0x0152, 0x0160, 0x0178, 0x017D, 0x0131, 0x0142, 0x0153, 0x0161, 0x017E, 0, 0x20AC,
];

const MAC_ROMAN_HIGH: [u16; 128] = [
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1, 0x00E0, 0x00E2, 0x00E4,
    0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8, 0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF,
    0x00F1, 0x00F3, 0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC, 0x2020,
    0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF, 0x00AE, 0x00A9, 0x2122, 0x00B4,
    0x00A8, 0x2260, 0x00C6, 0x00D8, 0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202,
    0x2211, 0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8, 0x00BF, 0x00A1,
    0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB, 0x00BB, 0x2026, 0x0020, 0x00C0, 0x00C3,
    0x00D5, 0x0152, 0x0153, 0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
    0x00FF, 0x0178, 0x2044, 0x00A4, 0x2039, 0x203A, 0xFB01, 0xFB02, 0x2021, 0x00B7, 0x201A,
    0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC,
    0x00D3, 0x00D4, 0, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC, 0x00AF, 0x02D8,
    0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
];

/// StandardEncoding from 0xA1 to 0xFF.
const STANDARD_HIGH: [u16; 95] = [
    0x00A1, 0x00A2, 0x00A3, 0x2044, 0x00A5, 0x0192, 0x00A7, 0x00A4, 0x0027, 0x201C, 0x00AB,
    0x2039, 0x203A, 0xFB01, 0xFB02, 0, 0x2013, 0x2020, 0x2021, 0x00B7, 0, 0x00B6, 0x2022,
    0x201A, 0x201E, 0x201D, 0x00BB, 0x2026, 0x2030, 0, 0x00BF, 0, 0x0060, 0x00B4, 0x02C6,
    0x02DC, 0x00AF, 0x02D8, 0x02D9, 0x00A8, 0, 0x02DA, 0x00B8, 0, 0x02DD, 0x02DB, 0x02C7,
    0x2014, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x00C6, 0, 0x00AA, 0, 0, 0, 0,
    0x0141, 0x00D8, 0x0152, 0x00BA, 0, 0, 0, 0, 0, 0x00E6, 0, 0, 0, 0x0131, 0, 0, 0x0142,
    0x00F8, 0x0153, 0x00DF, 0, 0, 0, 0,
];

fn win_ansi(code: u8) -> u16 {
    match code {
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        0x20..=0x7E | 0xA0..=0xFF => code as u16,
        _ => 0,
    }
}

fn pdf_doc(code: u8) -> u16 {
    match code {
        0x18..=0x1F => PDF_DOC_LOW[(code - 0x18) as usize],
        0x80..=0xA0 => PDF_DOC_HIGH[(code - 0x80) as usize],
        0xAD | 0x7F => 0,
        _ => code as u16,
    }
}

fn mac_roman(code: u8) -> u16 {
    match code {
        0x80..=0xFF => MAC_ROMAN_HIGH[(code - 0x80) as usize],
        0x20..=0x7E => code as u16,
        _ => 0,
    }
}

fn standard(code: u8) -> u16 {
    match code {
        0x27 => 0x2019,
        0x60 => 0x2018,
        0x20..=0x7E => code as u16,
        0xA1..=0xFF => STANDARD_HIGH[(code - 0xA1) as usize],
        _ => 0,
    }
}

/// Resolves an Adobe glyph name to a character.
///
/// Handles the common Latin glyph list plus `uniXXXX` and `uXXXX[XX]` forms.
pub fn glyph_to_char(name: &str) -> Option<char> {
    let name = name.split('.').next().unwrap_or(name);
    if name.len() == 1 {
        return name.chars().next().filter(|c| c.is_ascii_alphanumeric());
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }

    let cp: u32 = match name {
        "space" | "nbspace" => 0x20,
        "exclam" => 0x21,
        "quotedbl" => 0x22,
        "numbersign" => 0x23,
        "dollar" => 0x24,
        "percent" => 0x25,
        "ampersand" => 0x26,
        "quotesingle" => 0x27,
        "parenleft" => 0x28,
        "parenright" => 0x29,
        "asterisk" => 0x2A,
        "plus" => 0x2B,
        "comma" => 0x2C,
        "hyphen" | "minus" => 0x2D,
        "period" => 0x2E,
        "slash" => 0x2F,
        "zero" => 0x30,
        "one" => 0x31,
        "two" => 0x32,
        "three" => 0x33,
        "four" => 0x34,
        "five" => 0x35,
        "six" => 0x36,
        "seven" => 0x37,
        "eight" => 0x38,
        "nine" => 0x39,
        "colon" => 0x3A,
        "semicolon" => 0x3B,
        "less" => 0x3C,
        "equal" => 0x3D,
        "greater" => 0x3E,
        "question" => 0x3F,
        "at" => 0x40,
        "bracketleft" => 0x5B,
        "backslash" => 0x5C,
        "bracketright" => 0x5D,
        "asciicircum" => 0x5E,
        "underscore" => 0x5F,
        "grave" => 0x60,
        "braceleft" => 0x7B,
        "bar" => 0x7C,
        "braceright" => 0x7D,
        "asciitilde" => 0x7E,
        "exclamdown" => 0xA1,
        "cent" => 0xA2,
        "sterling" => 0xA3,
        "currency" => 0xA4,
        "yen" => 0xA5,
        "brokenbar" => 0xA6,
        "section" => 0xA7,
        "dieresis" => 0xA8,
        "copyright" => 0xA9,
        "ordfeminine" => 0xAA,
        "guillemotleft" => 0xAB,
        "logicalnot" => 0xAC,
        "sfthyphen" => 0xAD,
        "registered" => 0xAE,
        "macron" => 0xAF,
        "degree" => 0xB0,
        "plusminus" => 0xB1,
        "twosuperior" => 0xB2,
        "threesuperior" => 0xB3,
        "acute" => 0xB4,
        "mu" => 0xB5,
        "paragraph" => 0xB6,
        "periodcentered" => 0xB7,
        "cedilla" => 0xB8,
        "onesuperior" => 0xB9,
        "ordmasculine" => 0xBA,
        "guillemotright" => 0xBB,
        "onequarter" => 0xBC,
        "onehalf" => 0xBD,
        "threequarters" => 0xBE,
        "questiondown" => 0xBF,
        "Agrave" => 0xC0,
        "Aacute" => 0xC1,
        "Acircumflex" => 0xC2,
        "Atilde" => 0xC3,
        "Adieresis" => 0xC4,
        "Aring" => 0xC5,
        "AE" => 0xC6,
        "Ccedilla" => 0xC7,
        "Egrave" => 0xC8,
        "Eacute" => 0xC9,
        "Ecircumflex" => 0xCA,
        "Edieresis" => 0xCB,
        "Igrave" => 0xCC,
        "Iacute" => 0xCD,
        "Icircumflex" => 0xCE,
        "Idieresis" => 0xCF,
        "Eth" => 0xD0,
        "Ntilde" => 0xD1,
        "Ograve" => 0xD2,
        "Oacute" => 0xD3,
        "Ocircumflex" => 0xD4,
        "Otilde" => 0xD5,
        "Odieresis" => 0xD6,
        "multiply" => 0xD7,
        "Oslash" => 0xD8,
        "Ugrave" => 0xD9,
        "Uacute" => 0xDA,
        "Ucircumflex" => 0xDB,
        "Udieresis" => 0xDC,
        "Yacute" => 0xDD,
        "Thorn" => 0xDE,
        "germandbls" => 0xDF,
        "agrave" => 0xE0,
        "aacute" => 0xE1,
        "acircumflex" => 0xE2,
        "atilde" => 0xE3,
        "adieresis" => 0xE4,
        "aring" => 0xE5,
        "ae" => 0xE6,
        "ccedilla" => 0xE7,
        "egrave" => 0xE8,
        "eacute" => 0xE9,
        "ecircumflex" => 0xEA,
        "edieresis" => 0xEB,
        "igrave" => 0xEC,
        "iacute" => 0xED,
        "icircumflex" => 0xEE,
        "idieresis" => 0xEF,
        "eth" => 0xF0,
        "ntilde" => 0xF1,
        "ograve" => 0xF2,
        "oacute" => 0xF3,
        "ocircumflex" => 0xF4,
        "otilde" => 0xF5,
        "odieresis" => 0xF6,
        "divide" => 0xF7,
        "oslash" => 0xF8,
        "ugrave" => 0xF9,
        "uacute" => 0xFA,
        "ucircumflex" => 0xFB,
        "udieresis" => 0xFC,
        "yacute" => 0xFD,
        "thorn" => 0xFE,
        "ydieresis" => 0xFF,
        "dotlessi" => 0x0131,
        "Lslash" => 0x0141,
        "lslash" => 0x0142,
        "OE" => 0x0152,
        "oe" => 0x0153,
        "Scaron" => 0x0160,
        "scaron" => 0x0161,
        "Ydieresis" => 0x0178,
        "Zcaron" => 0x017D,
        "zcaron" => 0x017E,
        "florin" => 0x0192,
        "circumflex" => 0x02C6,
        "caron" => 0x02C7,
        "breve" => 0x02D8,
        "dotaccent" => 0x02D9,
        "ring" => 0x02DA,
        "ogonek" => 0x02DB,
        "tilde" => 0x02DC,
        "hungarumlaut" => 0x02DD,
        "endash" => 0x2013,
        "emdash" => 0x2014,
        "quoteleft" => 0x2018,
        "quoteright" => 0x2019,
        "quotesinglbase" => 0x201A,
        "quotedblleft" => 0x201C,
        "quotedblright" => 0x201D,
        "quotedblbase" => 0x201E,
        "dagger" => 0x2020,
        "daggerdbl" => 0x2021,
        "bullet" => 0x2022,
        "ellipsis" => 0x2026,
        "perthousand" => 0x2030,
        "guilsinglleft" => 0x2039,
        "guilsinglright" => 0x203A,
        "fraction" => 0x2044,
        "Euro" => 0x20AC,
        "trademark" => 0x2122,
        "partialdiff" => 0x2202,
        "Delta" => 0x2206,
        "summation" => 0x2211,
        "product" => 0x220F,
        "radical" => 0x221A,
        "infinity" => 0x221E,
        "integral" => 0x222B,
        "approxequal" => 0x2248,
        "notequal" => 0x2260,
        "lessequal" => 0x2264,
        "greaterequal" => 0x2265,
        "lozenge" => 0x25CA,
        "pi" => 0x03C0,
        "Omega" => 0x03A9,
        "fi" => 0xFB01,
        "fl" => 0xFB02,
        "ff" => 0xFB00,
        "ffi" => 0xFB03,
        "ffl" => 0xFB04,
        _ => return None,
    };
    char::from_u32(cp)
}

/// Decodes a PDF text string (Info entries, annotations).
///
/// A UTF-16BE or UTF-8 byte order mark selects that encoding. Anything else
/// is PDFDocEncoding.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes
        .iter()
        .map(|&b| BaseEncoding::PdfDoc.decode(b).unwrap_or(char::from(b)))
        .collect()
}
