use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};

/// Upper bound on operator/keyword length; longer runs are garbage.
const MAX_COMMAND_LENGTH: usize = 128;

/// PDF token types returned by the Lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of file marker
    EOF,

    /// Boolean value
    Boolean(bool),

    /// Null value
    Null,

    /// Integer number (no decimal point or exponent)
    Integer(i64),

    /// Real number
    Real(f64),

    /// String value (from literal strings like (hello))
    String(Vec<u8>),

    /// Hex string value (from hex strings like <48656c6c6f>)
    HexString(Vec<u8>),

    /// Name value (from /Name)
    Name(String),

    /// Command/operator (like 'q', 'Q', 'BT', 'ET', etc.)
    Command(String),

    /// Array start '['
    ArrayStart,

    /// Array end ']'
    ArrayEnd,

    /// Dictionary start '<<'
    DictStart,

    /// Dictionary end '>>'
    DictEnd,
}

/// PDF Lexer for tokenizing PDF syntax.
///
/// The lexer handles:
/// - Whitespace and comment skipping
/// - Number parsing (integers, reals, Adobe-compatible quirks)
/// - String parsing (literal and hexadecimal)
/// - Name parsing with `#xx` escapes
/// - Command/operator parsing
///
/// It keeps one byte of lookahead in `current`, so the underlying stream is
/// always one byte ahead of [`Lexer::position`].
pub struct Lexer {
    /// The input stream
    stream: Box<dyn BaseStream>,

    /// Current byte being examined, `None` at end of input
    current: Option<u8>,

    /// Buffer for building strings
    str_buf: Vec<u8>,
}

impl Lexer {
    /// Creates a new Lexer from a stream.
    pub fn new(mut stream: Box<dyn BaseStream>) -> PDFResult<Self> {
        let current = Self::read_byte(stream.as_mut())?;

        Ok(Lexer {
            stream,
            current,
            str_buf: Vec::new(),
        })
    }

    /// Reads the next byte from the stream; `None` on EOF.
    fn read_byte(stream: &mut dyn BaseStream) -> PDFResult<Option<u8>> {
        match stream.get_byte() {
            Ok(byte) => Ok(Some(byte)),
            Err(PDFError::UnexpectedEndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Advances to the next byte.
    fn next_char(&mut self) -> PDFResult<Option<u8>> {
        self.current = Self::read_byte(self.stream.as_mut())?;
        Ok(self.current)
    }

    /// Peeks at the byte after the current one without consuming it.
    fn peek_char(&mut self) -> PDFResult<Option<u8>> {
        match self.stream.peek_byte() {
            Ok(byte) => Ok(Some(byte)),
            Err(PDFError::UnexpectedEndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Absolute offset of the current (not yet consumed) byte.
    pub fn position(&self) -> usize {
        match self.current {
            Some(_) => self.stream.pos() - 1,
            None => self.stream.pos(),
        }
    }

    /// Absolute offset one past the last byte of input.
    pub fn end(&self) -> usize {
        self.stream.end()
    }

    /// Repositions the lexer so that the byte at `pos` is current.
    pub fn seek(&mut self, pos: usize) -> PDFResult<()> {
        self.stream.set_pos(pos.min(self.stream.end()))?;
        self.next_char()?;
        Ok(())
    }

    /// Returns the byte at an absolute offset without moving.
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        if pos >= self.stream.end() {
            return None;
        }
        self.stream
            .get_byte_range(pos, pos + 1)
            .ok()
            .and_then(|bytes| bytes.first().copied())
    }

    /// Copies the raw bytes `begin..end` (clamped to the input).
    pub fn read_range(&self, begin: usize, end: usize) -> PDFResult<Vec<u8>> {
        let end = end.min(self.stream.end());
        if begin >= end {
            return Ok(Vec::new());
        }
        self.stream.get_byte_range(begin, end)
    }

    /// Finds `needle` at or after `from`.
    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        self.stream.find(needle, from)
    }

    /// Checks if a byte is whitespace according to PDF spec.
    ///
    /// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
    pub fn is_whitespace(ch: u8) -> bool {
        matches!(ch, 0x00 | b'\t' | b'\n' | 0x0C | b'\r' | b' ')
    }

    /// Checks if a byte is a delimiter according to PDF spec.
    pub fn is_delimiter(ch: u8) -> bool {
        matches!(
            ch,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    /// Checks if a byte is special (whitespace or delimiter).
    fn is_special(ch: u8) -> bool {
        Self::is_whitespace(ch) || Self::is_delimiter(ch)
    }

    /// Skips whitespace and comments.
    fn skip_whitespace_and_comments(&mut self) -> PDFResult<()> {
        let mut comment = false;

        while let Some(ch) = self.current {
            if comment {
                if ch == b'\n' || ch == b'\r' {
                    comment = false;
                }
            } else if ch == b'%' {
                comment = true;
            } else if !Self::is_whitespace(ch) {
                break;
            }

            self.next_char()?;
        }

        Ok(())
    }

    /// Gets the next token from the stream.
    pub fn get_object(&mut self) -> PDFResult<Token> {
        self.skip_whitespace_and_comments()?;

        let Some(ch) = self.current else {
            return Ok(Token::EOF);
        };

        match ch {
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.get_number(),

            b'(' => self.get_string(),

            b'/' => self.get_name(),

            b'[' => {
                self.next_char()?;
                Ok(Token::ArrayStart)
            }

            b']' => {
                self.next_char()?;
                Ok(Token::ArrayEnd)
            }

            b'<' => {
                if self.next_char()? == Some(b'<') {
                    self.next_char()?;
                    Ok(Token::DictStart)
                } else {
                    self.get_hex_string()
                }
            }

            b'>' => {
                let next = self.next_char()?;
                if next == Some(b'>') {
                    self.next_char()?;
                    Ok(Token::DictEnd)
                } else {
                    Err(PDFError::syntax(format!(
                        "unexpected '>' at offset {}",
                        self.position()
                    )))
                }
            }

            // PostScript calculator braces are handed to the caller as commands
            b'{' | b'}' => {
                self.next_char()?;
                Ok(Token::Command((ch as char).to_string()))
            }

            b')' => {
                self.next_char()?;
                Err(PDFError::syntax(format!(
                    "illegal ')' at offset {}",
                    self.position()
                )))
            }

            _ => self.get_command(),
        }
    }

    /// Parses a number token.
    ///
    /// Follows Adobe Reader's leniency: a doubled leading minus is ignored,
    /// a sign followed by a line break skips the break, minus signs inside a
    /// number are dropped, and a lone sign or dot reads as zero.
    fn get_number(&mut self) -> PDFResult<Token> {
        let mut ch = self.current;
        let mut is_real = false;
        let mut e_notation = false;
        let mut divide_by = 0.0;
        let mut sign = 1.0;

        if ch == Some(b'-') {
            sign = -1.0;
            ch = self.next_char()?;
            if ch == Some(b'-') {
                ch = self.next_char()?;
            }
        } else if ch == Some(b'+') {
            ch = self.next_char()?;
        }

        while matches!(ch, Some(b'\n') | Some(b'\r')) {
            ch = self.next_char()?;
        }

        if ch == Some(b'.') {
            is_real = true;
            divide_by = 10.0;
            ch = self.next_char()?;
        }

        let first_digit = match ch {
            Some(d @ b'0'..=b'9') => d,
            Some(other) if !(Self::is_whitespace(other) || other == b'(' || other == b'<') => {
                return Err(PDFError::syntax(format!(
                    "invalid number character {:?} at offset {}",
                    other as char,
                    self.position()
                )));
            }
            _ => return Ok(Token::Integer(0)),
        };

        let mut base_value = (first_digit - b'0') as f64;
        let mut power_value: i32 = 0;
        let mut power_value_sign = 1;

        loop {
            ch = self.next_char()?;
            let Some(c) = ch else {
                break;
            };

            match c {
                b'0'..=b'9' => {
                    let digit = (c - b'0') as f64;
                    if e_notation {
                        power_value = power_value.saturating_mul(10).saturating_add((c - b'0') as i32);
                    } else {
                        if divide_by != 0.0 {
                            divide_by *= 10.0;
                        }
                        base_value = base_value * 10.0 + digit;
                    }
                }
                b'.' => {
                    if divide_by == 0.0 {
                        divide_by = 1.0;
                        is_real = true;
                    } else {
                        // A number can have only one dot
                        break;
                    }
                }
                b'-' => {
                    // Ignore minus signs in the middle of numbers
                }
                b'E' | b'e' => {
                    // Either scientific notation or the start of an operator
                    match self.peek_char()? {
                        Some(sign_ch @ (b'+' | b'-')) => {
                            power_value_sign = if sign_ch == b'-' { -1 } else { 1 };
                            self.next_char()?;
                        }
                        Some(b'0'..=b'9') => {}
                        _ => break,
                    }
                    e_notation = true;
                    is_real = true;
                }
                _ => break,
            }
        }

        let mut result = base_value;
        if divide_by != 0.0 {
            result /= divide_by;
        }
        if e_notation {
            result *= 10_f64.powi(power_value_sign * power_value);
        }
        result *= sign;

        if !is_real && result.abs() < i64::MAX as f64 {
            Ok(Token::Integer(result as i64))
        } else {
            Ok(Token::Real(result))
        }
    }

    /// Parses a literal string token.
    ///
    /// Handles nested parentheses and escape sequences.
    fn get_string(&mut self) -> PDFResult<Token> {
        let mut num_paren = 1;
        self.str_buf.clear();

        let mut ch = self.next_char()?;

        loop {
            let mut char_buffered = false;

            let Some(c) = ch else {
                // Unterminated string: keep what we have
                break;
            };

            match c {
                b'(' => {
                    num_paren += 1;
                    self.str_buf.push(b'(');
                }

                b')' => {
                    num_paren -= 1;
                    if num_paren == 0 {
                        self.next_char()?;
                        break;
                    }
                    self.str_buf.push(b')');
                }

                b'\\' => {
                    ch = self.next_char()?;
                    let Some(escaped) = ch else {
                        break;
                    };
                    match escaped {
                        b'n' => self.str_buf.push(b'\n'),
                        b'r' => self.str_buf.push(b'\r'),
                        b't' => self.str_buf.push(b'\t'),
                        b'b' => self.str_buf.push(0x08),
                        b'f' => self.str_buf.push(0x0C),
                        b'\\' | b'(' | b')' => self.str_buf.push(escaped),
                        b'0'..=b'7' => {
                            // Octal escape \ddd (1-3 digits)
                            let mut x = escaped & 0x0F;
                            ch = self.next_char()?;
                            char_buffered = true;

                            if let Some(d1 @ b'0'..=b'7') = ch {
                                x = (x << 3).wrapping_add(d1 & 0x0F);
                                ch = self.next_char()?;

                                if let Some(d2 @ b'0'..=b'7') = ch {
                                    char_buffered = false;
                                    x = (x << 3).wrapping_add(d2 & 0x0F);
                                }
                            }
                            self.str_buf.push(x);
                        }
                        b'\r' => {
                            // Line continuation; swallow a following LF
                            if self.peek_char()? == Some(b'\n') {
                                self.next_char()?;
                            }
                        }
                        b'\n' => {}
                        other => self.str_buf.push(other),
                    }
                }

                other => self.str_buf.push(other),
            }

            if !char_buffered {
                ch = self.next_char()?;
            }
        }

        Ok(Token::String(self.str_buf.clone()))
    }

    /// Converts a hex character to its numeric value.
    fn to_hex_digit(ch: u8) -> Option<u8> {
        match ch {
            b'0'..=b'9' => Some(ch - b'0'),
            b'A'..=b'F' => Some(ch - b'A' + 10),
            b'a'..=b'f' => Some(ch - b'a' + 10),
            _ => None,
        }
    }

    /// Parses a hex string token such as `<48656c6c6f>`.
    ///
    /// Invalid digits are skipped and an odd trailing digit is padded with 0.
    fn get_hex_string(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        let mut ch = self.current;
        let mut first_digit: Option<u8> = None;

        while let Some(c) = ch {
            if c == b'>' {
                self.next_char()?;
                break;
            }
            if !Self::is_whitespace(c) {
                if let Some(digit) = Self::to_hex_digit(c) {
                    match first_digit.take() {
                        None => first_digit = Some(digit),
                        Some(high) => self.str_buf.push((high << 4) | digit),
                    }
                }
            }
            ch = self.next_char()?;
        }

        if let Some(high) = first_digit {
            self.str_buf.push(high << 4);
        }

        Ok(Token::HexString(self.str_buf.clone()))
    }

    /// Parses a name token.
    ///
    /// Names start with '/' and continue until whitespace or delimiter.
    /// Handles '#' escape sequences like #20 for space.
    fn get_name(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();

        let mut ch = self.next_char()?;

        while let Some(c) = ch {
            if Self::is_special(c) {
                break;
            }

            if c == b'#' {
                ch = self.next_char()?;
                let Some(h1) = ch else {
                    self.str_buf.push(b'#');
                    break;
                };
                if Self::is_special(h1) {
                    self.str_buf.push(b'#');
                    break;
                }

                match Self::to_hex_digit(h1) {
                    Some(x) => {
                        ch = self.next_char()?;
                        match ch.and_then(Self::to_hex_digit) {
                            Some(x2) => self.str_buf.push((x << 4) | x2),
                            None => {
                                self.str_buf.push(b'#');
                                self.str_buf.push(h1);
                                // Re-examine the byte after the broken escape
                                continue;
                            }
                        }
                    }
                    None => {
                        self.str_buf.push(b'#');
                        self.str_buf.push(h1);
                    }
                }
            } else {
                self.str_buf.push(c);
            }

            ch = self.next_char()?;
        }

        Ok(Token::Name(String::from_utf8_lossy(&self.str_buf).into_owned()))
    }

    /// Parses a command/keyword token.
    ///
    /// Handles the keywords `true`, `false` and `null`.
    fn get_command(&mut self) -> PDFResult<Token> {
        let mut command = String::new();
        let mut ch = self.current;

        while let Some(c) = ch {
            if Self::is_special(c) {
                break;
            }
            if command.len() >= MAX_COMMAND_LENGTH {
                // Consume the rest so the next call makes progress
                while let Some(rest) = self.next_char()? {
                    if Self::is_special(rest) {
                        break;
                    }
                }
                return Err(PDFError::syntax(format!(
                    "command token too long at offset {}",
                    self.position()
                )));
            }

            command.push(c as char);
            ch = self.next_char()?;
        }

        match command.as_str() {
            "true" => Ok(Token::Boolean(true)),
            "false" => Ok(Token::Boolean(false)),
            "null" => Ok(Token::Null),
            _ => Ok(Token::Command(command)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Stream;

    fn lexer(data: &[u8]) -> Lexer {
        let stream = Box::new(Stream::from_bytes(data.to_vec())) as Box<dyn BaseStream>;
        Lexer::new(stream).unwrap()
    }

    fn tokens(data: &[u8]) -> Vec<Token> {
        let mut lexer = lexer(data);
        let mut out = Vec::new();
        loop {
            let token = lexer.get_object().unwrap();
            if token == Token::EOF {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn test_is_whitespace() {
        for ch in [0x00, 0x09, 0x0A, 0x0C, 0x0D, 0x20] {
            assert!(Lexer::is_whitespace(ch));
        }
        assert!(!Lexer::is_whitespace(b'A'));
    }

    #[test]
    fn test_is_delimiter() {
        for ch in b"()<>[]{}/%" {
            assert!(Lexer::is_delimiter(*ch));
        }
        assert!(!Lexer::is_delimiter(b'A'));
    }

    #[test]
    fn test_eof() {
        assert_eq!(lexer(b"").get_object().unwrap(), Token::EOF);
        assert_eq!(lexer(b"  % only a comment").get_object().unwrap(), Token::EOF);
    }

    #[test]
    fn test_structural_tokens() {
        assert_eq!(
            tokens(b"[ ] << >>"),
            vec![
                Token::ArrayStart,
                Token::ArrayEnd,
                Token::DictStart,
                Token::DictEnd
            ]
        );
    }

    #[test]
    fn test_skip_comments() {
        assert_eq!(tokens(b"% comment\n["), vec![Token::ArrayStart]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens(b"42 -17 +5 3.5 -.25 4. 1e3 --3 0"),
            vec![
                Token::Integer(42),
                Token::Integer(-17),
                Token::Integer(5),
                Token::Real(3.5),
                Token::Real(-0.25),
                Token::Real(4.0),
                Token::Real(1000.0),
                Token::Integer(-3),
                Token::Integer(0),
            ]
        );
    }

    #[test]
    fn test_lone_sign_is_zero() {
        assert_eq!(tokens(b"- "), vec![Token::Integer(0)]);
    }

    #[test]
    fn test_number_followed_by_operator_starting_with_e() {
        // "0 0 Td" style: digits then an operator starting with 'e' must split
        assert_eq!(
            tokens(b"12endobj"),
            vec![Token::Integer(12), Token::Command("endobj".to_string())]
        );
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(
            tokens(b"(a(b)c) (x\\)y) (\\101\\12B) (line\\\ncont) (\\n\\t)"),
            vec![
                Token::String(b"a(b)c".to_vec()),
                Token::String(b"x)y".to_vec()),
                Token::String(vec![b'A', 0o12, b'B']),
                Token::String(b"linecont".to_vec()),
                Token::String(b"\n\t".to_vec()),
            ]
        );
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(
            tokens(b"<48 65 6c6C6f> <414>"),
            vec![
                Token::HexString(b"Hello".to_vec()),
                Token::HexString(vec![0x41, 0x40]),
            ]
        );
    }

    #[test]
    fn test_names() {
        assert_eq!(
            tokens(b"/Type /A#20B /Odd#G1 /"),
            vec![
                Token::Name("Type".to_string()),
                Token::Name("A B".to_string()),
                Token::Name("Odd#G1".to_string()),
                Token::Name(String::new()),
            ]
        );
    }

    #[test]
    fn test_keywords_and_commands() {
        assert_eq!(
            tokens(b"true false null BT T* '"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Null,
                Token::Command("BT".to_string()),
                Token::Command("T*".to_string()),
                Token::Command("'".to_string()),
            ]
        );
    }

    #[test]
    fn test_illegal_close_paren_advances() {
        let mut lexer = lexer(b") 7");
        assert!(lexer.get_object().is_err());
        assert_eq!(lexer.get_object().unwrap(), Token::Integer(7));
    }

    #[test]
    fn test_too_long_command_is_consumed() {
        let mut data = vec![b'x'; 300];
        data.extend_from_slice(b" 5");
        let mut lexer = lexer(&data);
        assert!(lexer.get_object().is_err());
        assert_eq!(lexer.get_object().unwrap(), Token::Integer(5));
    }

    #[test]
    fn test_position_and_seek() {
        let mut lexer = lexer(b"stream\r\nDATA");
        assert_eq!(lexer.get_object().unwrap(), Token::Command("stream".to_string()));
        assert_eq!(lexer.position(), 6);
        assert_eq!(lexer.byte_at(6), Some(b'\r'));
        lexer.seek(8).unwrap();
        assert_eq!(lexer.get_object().unwrap(), Token::Command("DATA".to_string()));
    }
}
