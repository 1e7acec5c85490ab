use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Dictionary payload shared by dictionaries and stream headers.
pub type Dict = FxHashMap<String, PDFObject>;

/// PDF object types as defined in the PDF specification.
///
/// References stay unresolved inside containers. Only the cross-reference
/// resolver turns them into values, which is what makes cyclic object
/// graphs safe to hold.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null value
    Null,

    /// Boolean value
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// String value; literal and hex strings both land here
    String(Vec<u8>),

    /// Name value (from /Name)
    Name(String),

    /// Array of objects
    Array(Vec<PDFObject>),

    /// Dictionary (key-value pairs)
    Dictionary(Dict),

    /// Indirect object reference (like "5 0 R")
    Reference { num: u32, generation: u32 },

    /// Stream object: dictionary plus the raw, still-encoded payload
    Stream { dict: Dict, data: Arc<[u8]> },

    /// End of file marker
    EOF,

    /// Operator keyword; only meaningful to content-stream readers
    Command(String),
}

impl PDFObject {
    /// Returns true if this object is the EOF marker.
    pub fn is_eof(&self) -> bool {
        matches!(self, PDFObject::EOF)
    }

    /// Returns true if this object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, PDFObject::Null)
    }

    /// Returns true if this object is the given command.
    pub fn is_command(&self, cmd: &str) -> bool {
        matches!(self, PDFObject::Command(command) if command == cmd)
    }

    /// Numeric value of an Integer or Real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PDFObject::Integer(i) => Some(*i as f64),
            PDFObject::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Integer value; reals are accepted when they have no fraction.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PDFObject::Integer(i) => Some(*i),
            PDFObject::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PDFObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PDFObject::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            PDFObject::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PDFObject]> {
        match self {
            PDFObject::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary of a Dictionary or of a Stream header.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            PDFObject::Dictionary(dict) => Some(dict),
            PDFObject::Stream { dict, .. } => Some(dict),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u32)> {
        match self {
            PDFObject::Reference { num, generation } => Some((*num, *generation)),
            _ => None,
        }
    }

    /// Looks a key up in a Dictionary or Stream header.
    pub fn get(&self, key: &str) -> Option<&PDFObject> {
        self.as_dict().and_then(|dict| dict.get(key))
    }

    /// Reads an array of numbers, skipping non-numeric items.
    pub fn as_number_array(&self) -> Option<Vec<f64>> {
        self.as_array()
            .map(|items| items.iter().filter_map(PDFObject::as_number).collect())
    }

    /// Short type label used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            PDFObject::Null => "null",
            PDFObject::Boolean(_) => "boolean",
            PDFObject::Integer(_) => "integer",
            PDFObject::Real(_) => "real",
            PDFObject::String(_) => "string",
            PDFObject::Name(_) => "name",
            PDFObject::Array(_) => "array",
            PDFObject::Dictionary(_) => "dictionary",
            PDFObject::Reference { .. } => "reference",
            PDFObject::Stream { .. } => "stream",
            PDFObject::EOF => "EOF",
            PDFObject::Command(_) => "command",
        }
    }
}

/// Resolver used for indirect `/Length` entries while reading streams.
pub type RefResolver<'a> = dyn Fn(u32, u32) -> PDFResult<PDFObject> + 'a;

/// PDF Parser for building PDF objects from tokens.
///
/// The parser maintains a 2-token lookahead buffer to detect indirect
/// references (`N G R`) and streams (a dictionary followed by `stream`).
/// The lookahead stops after an `ID` keyword so inline image data is never
/// tokenized.
pub struct Parser<'a> {
    /// The lexer that provides tokens
    lexer: Lexer,

    /// First lookahead token
    buf1: Option<Token>,

    /// Second lookahead token
    buf2: Option<Token>,

    /// Optional reference resolver for indirect stream lengths
    ref_resolver: Option<&'a RefResolver<'a>>,

    /// Number of lexical errors skipped so far
    syntax_errors: usize,
}

/// Lexical errors tolerated before the input is treated as garbage.
const MAX_SYNTAX_ERRORS: usize = 100;

fn is_image_data_keyword(token: &Option<Token>) -> bool {
    matches!(token, Some(Token::Command(cmd)) if cmd == "ID")
}

impl<'a> Parser<'a> {
    /// Creates a new Parser from a Lexer.
    pub fn new(lexer: Lexer) -> PDFResult<Self> {
        let mut parser = Parser {
            lexer,
            buf1: None,
            buf2: None,
            ref_resolver: None,
            syntax_errors: 0,
        };
        parser.shift()?;
        Ok(parser)
    }

    /// Sets a reference resolver for streams with indirect /Length entries.
    pub fn set_ref_resolver(&mut self, resolver: &'a RefResolver<'a>) {
        self.ref_resolver = Some(resolver);
    }

    /// Reads the next token, skipping lexical errors.
    ///
    /// Every lexer error consumes input, so skipping always makes progress.
    fn next_token(&mut self) -> PDFResult<Token> {
        loop {
            match self.lexer.get_object() {
                Err(PDFError::Syntax(message)) => {
                    self.syntax_errors += 1;
                    if self.syntax_errors > MAX_SYNTAX_ERRORS {
                        return Err(PDFError::syntax(format!(
                            "too many syntax errors, last: {}",
                            message
                        )));
                    }
                    log::warn!("Skipping bad token: {}", message);
                }
                result => return result,
            }
        }
    }

    /// Advances the lookahead by one token.
    fn shift(&mut self) -> PDFResult<()> {
        self.buf1 = match self.buf2.take() {
            Some(token) => Some(token),
            None => Some(self.next_token()?),
        };
        if is_image_data_keyword(&self.buf1) {
            self.buf2 = None;
        } else {
            self.buf2 = Some(self.next_token()?);
        }
        Ok(())
    }

    /// Refills both lookahead slots from an absolute position.
    fn restart_at(&mut self, pos: usize) -> PDFResult<()> {
        self.lexer.seek(pos)?;
        self.buf1 = None;
        self.buf2 = None;
        self.shift()
    }

    /// Gets the next PDF object from the stream.
    ///
    /// Handles arrays, dictionaries, streams, inline images, indirect
    /// references and simple objects. Operators come back as `Command`.
    pub fn get_object(&mut self) -> PDFResult<PDFObject> {
        let token = match self.buf1.take() {
            Some(token) => token,
            None => self.next_token()?,
        };

        self.shift()?;

        match token {
            Token::ArrayStart => self.parse_array(),

            Token::DictStart => self.parse_dictionary(),

            Token::ArrayEnd => Err(PDFError::syntax("unexpected ']'")),
            Token::DictEnd => Err(PDFError::syntax("unexpected '>>'")),

            Token::Integer(num) => {
                if let (Some(Token::Integer(generation)), Some(Token::Command(cmd))) =
                    (&self.buf1, &self.buf2)
                {
                    if cmd == "R" {
                        if let (Ok(num), Ok(generation)) =
                            (u32::try_from(num), u32::try_from(*generation))
                        {
                            self.shift()?;
                            self.shift()?;
                            return Ok(PDFObject::Reference { num, generation });
                        }
                    }
                }
                Ok(PDFObject::Integer(num))
            }

            Token::Command(cmd) if cmd == "BI" => self.parse_inline_image(),

            Token::EOF => Ok(PDFObject::EOF),
            Token::Boolean(b) => Ok(PDFObject::Boolean(b)),
            Token::Null => Ok(PDFObject::Null),
            Token::Real(r) => Ok(PDFObject::Real(r)),
            Token::String(s) | Token::HexString(s) => Ok(PDFObject::String(s)),
            Token::Name(n) => Ok(PDFObject::Name(n)),
            Token::Command(c) => Ok(PDFObject::Command(c)),
        }
    }

    /// Parses an array: [ obj1 obj2 ... ]
    fn parse_array(&mut self) -> PDFResult<PDFObject> {
        let mut array = Vec::new();

        loop {
            match &self.buf1 {
                Some(Token::ArrayEnd) => {
                    self.shift()?;
                    break;
                }
                Some(Token::EOF) => {
                    return Err(PDFError::syntax("unterminated array (missing ']')"));
                }
                _ => {}
            }

            match self.get_object() {
                Ok(obj) => array.push(obj),
                Err(e) => {
                    log::warn!("Error parsing array element: {}, using null", e);
                    array.push(PDFObject::Null);
                }
            }
        }

        Ok(PDFObject::Array(array))
    }

    /// Parses a dictionary: << /Key1 value1 /Key2 value2 ... >>
    ///
    /// A dictionary followed by the `stream` keyword becomes a stream.
    fn parse_dictionary(&mut self) -> PDFResult<PDFObject> {
        let mut dict = Dict::default();

        loop {
            let key = match &self.buf1 {
                Some(Token::DictEnd) => break,
                Some(Token::EOF) | None => {
                    return Err(PDFError::syntax("unterminated dictionary (missing '>>')"));
                }
                Some(Token::Name(name)) => name.clone(),
                Some(other) => {
                    log::warn!("Skipping non-name dictionary key {:?}", other);
                    self.shift()?;
                    continue;
                }
            };

            self.shift()?;

            match &self.buf1 {
                Some(Token::EOF) => {
                    return Err(PDFError::syntax("unterminated dictionary (EOF after key)"));
                }
                Some(Token::DictEnd) => {
                    dict.insert(key, PDFObject::Null);
                    break;
                }
                _ => {}
            }

            let value = match self.get_object() {
                Ok(val) => val,
                Err(e) => {
                    log::warn!(
                        "Error parsing dictionary value for key '{}': {}, using null",
                        key,
                        e
                    );
                    PDFObject::Null
                }
            };
            dict.insert(key, value);
        }

        // buf1 is '>>'; a following "stream" keyword turns this into a stream
        if matches!(&self.buf2, Some(Token::Command(cmd)) if cmd == "stream") {
            return self.parse_stream(dict);
        }

        self.shift()?;
        Ok(PDFObject::Dictionary(dict))
    }

    /// Resolves the declared /Length of a stream, if usable.
    fn declared_length(&self, dict: &Dict) -> Option<usize> {
        match dict.get("Length")? {
            PDFObject::Reference { num, generation } => {
                let resolver = self.ref_resolver?;
                match resolver(*num, *generation) {
                    Ok(resolved) => resolved.as_usize(),
                    Err(e) => {
                        log::warn!(
                            "Failed to resolve /Length {} {} R: {}, scanning for endstream",
                            num,
                            generation,
                            e
                        );
                        None
                    }
                }
            }
            other => other.as_usize(),
        }
    }

    /// Returns true if `endstream` follows `pos`, allowing whitespace.
    fn endstream_follows(&self, mut pos: usize) -> bool {
        while let Some(byte) = self.lexer.byte_at(pos) {
            if !Lexer::is_whitespace(byte) {
                break;
            }
            pos += 1;
        }
        self.lexer.read_range(pos, pos + 9).is_ok_and(|bytes| bytes == b"endstream")
    }

    /// Parses stream data following `<< ... >> stream`.
    ///
    /// Honours /Length when it is consistent with the position of
    /// `endstream`; otherwise scans for the keyword.
    fn parse_stream(&mut self, dict: Dict) -> PDFResult<PDFObject> {
        // The lexer's current byte is the one right after "stream"
        let mut start = self.lexer.position();
        while matches!(self.lexer.byte_at(start), Some(b' ') | Some(b'\t')) {
            start += 1;
        }
        match self.lexer.byte_at(start) {
            Some(b'\r') => {
                start += 1;
                if self.lexer.byte_at(start) == Some(b'\n') {
                    start += 1;
                }
            }
            Some(b'\n') => start += 1,
            _ => {}
        }

        let end = match self.declared_length(&dict) {
            Some(len) if start + len <= self.lexer.end() && self.endstream_follows(start + len) => {
                start + len
            }
            declared => {
                let found = self.lexer.find(b"endstream", start).ok_or_else(|| {
                    PDFError::syntax(format!("missing endstream for stream at offset {}", start))
                })?;
                if declared.is_some() {
                    log::warn!("Stream /Length at offset {} is inconsistent, using endstream", start);
                }
                let mut end = found;
                if end > start && self.lexer.byte_at(end - 1) == Some(b'\n') {
                    end -= 1;
                }
                if end > start && self.lexer.byte_at(end - 1) == Some(b'\r') {
                    end -= 1;
                }
                end
            }
        };

        let data = self.lexer.read_range(start, end)?;

        self.restart_at(end)?;
        if matches!(&self.buf1, Some(Token::Command(cmd)) if cmd == "endstream") {
            self.shift()?;
        }

        Ok(PDFObject::Stream {
            dict,
            data: Arc::from(data),
        })
    }

    /// Parses an inline image: `BI <dict pairs> ID <data> EI`.
    ///
    /// Returns the image as a stream object and leaves `EI` as the next
    /// token, so content-stream readers see the operator as usual.
    fn parse_inline_image(&mut self) -> PDFResult<PDFObject> {
        let mut dict = Dict::default();

        loop {
            match &self.buf1 {
                Some(Token::Command(cmd)) if cmd == "ID" => break,
                Some(Token::EOF) | None => {
                    return Err(PDFError::syntax("unterminated inline image dictionary"));
                }
                Some(Token::Name(_)) => {}
                Some(_) => {
                    self.shift()?;
                    continue;
                }
            }

            let Some(Token::Name(key)) = self.buf1.take() else {
                continue;
            };
            self.shift()?;

            if is_image_data_keyword(&self.buf1) {
                break;
            }
            let value = self.get_object()?;
            dict.insert(key, value);
        }

        // Current byte is the single whitespace after "ID"
        let mut start = self.lexer.position();
        if self.lexer.byte_at(start).is_some_and(Lexer::is_whitespace) {
            start += 1;
        }

        let declared = dict
            .get("L")
            .or_else(|| dict.get("Length"))
            .and_then(PDFObject::as_usize);

        let (data_end, ei_pos) = match declared {
            Some(len) if start + len <= self.lexer.end() => {
                let end = start + len;
                let ei = self.find_inline_image_end(end).unwrap_or(end);
                (end, ei)
            }
            _ => {
                let ei = self.find_inline_image_end(start).ok_or_else(|| {
                    PDFError::syntax(format!("missing EI for inline image at offset {}", start))
                })?;
                let mut end = ei;
                if end > start && self.lexer.byte_at(end - 1).is_some_and(Lexer::is_whitespace) {
                    end -= 1;
                }
                (end, ei)
            }
        };

        let data = self.lexer.read_range(start, data_end)?;
        self.restart_at(ei_pos)?;

        Ok(PDFObject::Stream {
            dict,
            data: Arc::from(data),
        })
    }

    /// Finds an `EI` keyword at or after `from` that is delimited on both sides.
    fn find_inline_image_end(&self, from: usize) -> Option<usize> {
        let mut search = from;
        while let Some(pos) = self.lexer.find(b"EI", search) {
            let before_ok = pos == from
                || self
                    .lexer
                    .byte_at(pos - 1)
                    .is_some_and(Lexer::is_whitespace);
            let after_ok = match self.lexer.byte_at(pos + 2) {
                None => true,
                Some(byte) => Lexer::is_whitespace(byte) || Lexer::is_delimiter(byte),
            };
            if before_ok && after_ok {
                return Some(pos);
            }
            search = pos + 1;
        }
        None
    }

    /// Checks if there are more objects to parse.
    pub fn has_more(&self) -> bool {
        !matches!(&self.buf1, Some(Token::EOF))
    }

    /// Number of bad tokens skipped so far.
    pub fn syntax_errors(&self) -> usize {
        self.syntax_errors
    }
}
