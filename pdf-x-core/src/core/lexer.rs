use super::base_stream::BaseStream;
use super::error::{PDFError, PDFResult};

/// Tokens produced by the [`Lexer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of data
    EOF,

    /// `true` / `false`
    Boolean(bool),

    /// `null`
    Null,

    /// Integer or real number
    Number(f64),

    /// Literal string `( ... )`
    String(Vec<u8>),

    /// Hex string `< ... >`
    HexString(Vec<u8>),

    /// Name `/Name`, with `#xx` escapes decoded
    Name(String),

    /// Bare keyword: operators, `obj`, `R`, `stream`, ...
    Command(String),

    /// `[`
    ArrayStart,

    /// `]`
    ArrayEnd,

    /// `<<`
    DictStart,

    /// `>>`
    DictEnd,
}

/// Longest keyword the lexer accepts before giving up on a token.
const MAX_COMMAND_LENGTH: usize = 128;

/// Tokenizer for PDF syntax.
///
/// The lexer borrows its stream for its whole lifetime and keeps one byte of
/// lookahead in `current`. [`Lexer::position`] accounts for that lookahead so
/// callers can seek back to a token boundary with [`Lexer::seek`].
pub struct Lexer<'s> {
    stream: &'s mut dyn BaseStream,

    /// Current byte being examined, `None` at end of data
    current: Option<u8>,

    /// Scratch buffer for strings and names
    str_buf: Vec<u8>,
}

impl<'s> Lexer<'s> {
    /// Creates a lexer starting at the stream's current position.
    pub fn new(stream: &'s mut dyn BaseStream) -> PDFResult<Self> {
        let current = Self::read_byte(stream)?;
        Ok(Lexer {
            stream,
            current,
            str_buf: Vec::new(),
        })
    }

    fn read_byte(stream: &mut dyn BaseStream) -> PDFResult<Option<u8>> {
        match stream.get_byte() {
            Ok(byte) => Ok(Some(byte)),
            Err(PDFError::UnexpectedEndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn next_char(&mut self) -> PDFResult<Option<u8>> {
        self.current = Self::read_byte(self.stream)?;
        Ok(self.current)
    }

    fn peek_char(&mut self) -> PDFResult<Option<u8>> {
        match self.stream.peek_byte() {
            Ok(byte) => Ok(Some(byte)),
            Err(PDFError::UnexpectedEndOfStream) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Offset of the byte the next token starts from.
    pub fn position(&self) -> usize {
        match self.current {
            Some(_) => self.stream.pos() - 1,
            None => self.stream.pos(),
        }
    }

    /// Moves the lexer to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> PDFResult<()> {
        self.stream.set_pos(pos)?;
        self.next_char()?;
        Ok(())
    }

    /// Gives direct access to the underlying stream, positioned at
    /// [`Lexer::position`]. Used for binary payloads (stream data, inline
    /// images); call [`Lexer::seek`] afterwards to resume tokenizing.
    pub fn stream_mut(&mut self) -> PDFResult<&mut dyn BaseStream> {
        let pos = self.position();
        self.stream.set_pos(pos)?;
        Ok(&mut *self.stream)
    }

    /// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
    pub fn is_whitespace(ch: u8) -> bool {
        matches!(ch, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
    }

    /// PDF delimiters: ( ) < > [ ] { } / %
    pub fn is_delimiter(ch: u8) -> bool {
        matches!(
            ch,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
    }

    fn is_special(ch: u8) -> bool {
        Self::is_whitespace(ch) || Self::is_delimiter(ch)
    }

    fn hex_value(ch: u8) -> Option<u8> {
        match ch {
            b'0'..=b'9' => Some(ch - b'0'),
            b'a'..=b'f' => Some(ch - b'a' + 10),
            b'A'..=b'F' => Some(ch - b'A' + 10),
            _ => None,
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> PDFResult<()> {
        let mut in_comment = false;
        while let Some(ch) = self.current {
            if in_comment {
                if ch == b'\n' || ch == b'\r' {
                    in_comment = false;
                }
            } else if ch == b'%' {
                in_comment = true;
            } else if !Self::is_whitespace(ch) {
                break;
            }
            self.next_char()?;
        }
        Ok(())
    }

    /// Returns the next token.
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
                if self.next_char()? == Some(b'>') {
                    self.next_char()?;
                    Ok(Token::DictEnd)
                } else {
                    Err(PDFError::Format(format!(
                        "unexpected '>' at offset {}",
                        self.position()
                    )))
                }
            }
            b'{' | b'}' => {
                self.next_char()?;
                Ok(Token::Command((ch as char).to_string()))
            }
            b')' => {
                self.next_char()?;
                Err(PDFError::Format(format!(
                    "unbalanced ')' at offset {}",
                    self.position()
                )))
            }
            _ => self.get_command(),
        }
    }

    /// Parses a number; tolerates a doubled minus sign and stray minus signs
    /// inside the digits the way Acrobat does.
    fn get_number(&mut self) -> PDFResult<Token> {
        let mut ch = self.current;
        let mut negative = false;

        match ch {
            Some(b'-') => {
                negative = true;
                ch = self.next_char()?;
                if ch == Some(b'-') {
                    ch = self.next_char()?;
                }
            }
            Some(b'+') => ch = self.next_char()?,
            _ => {}
        }

        while matches!(ch, Some(b'\n') | Some(b'\r')) {
            ch = self.next_char()?;
        }

        let mut divisor = 0.0;
        if ch == Some(b'.') {
            divisor = 10.0;
            ch = self.next_char()?;
        }

        let first = match ch {
            Some(d @ b'0'..=b'9') => d,
            other => {
                // A lone sign or dot reads as zero
                if other.is_none_or(|c| Self::is_whitespace(c) || c == b'(' || c == b'<') {
                    return Ok(Token::Number(0.0));
                }
                return Err(PDFError::Format(format!(
                    "invalid number at offset {}",
                    self.position()
                )));
            }
        };

        let mut value = (first - b'0') as f64;
        let mut exponent: i32 = 0;
        let mut exponent_negative = false;
        let mut in_exponent = false;

        loop {
            ch = self.next_char()?;
            match ch {
                Some(d @ b'0'..=b'9') => {
                    let digit = d - b'0';
                    if in_exponent {
                        exponent = exponent.saturating_mul(10).saturating_add(digit as i32);
                    } else {
                        if divisor != 0.0 {
                            divisor *= 10.0;
                        }
                        value = value * 10.0 + digit as f64;
                    }
                }
                Some(b'.') if !in_exponent => {
                    if divisor == 0.0 {
                        divisor = 1.0;
                    } else {
                        break;
                    }
                }
                Some(b'-') if !in_exponent => {}
                Some(b'e') | Some(b'E') if !in_exponent => {
                    match self.peek_char()? {
                        Some(sign @ (b'+' | b'-')) => {
                            exponent_negative = sign == b'-';
                            self.next_char()?;
                        }
                        Some(b'0'..=b'9') => {}
                        _ => break,
                    }
                    in_exponent = true;
                }
                _ => break,
            }
        }

        if divisor != 0.0 {
            value /= divisor;
        }
        if in_exponent {
            let power = if exponent_negative { -exponent } else { exponent };
            value *= 10f64.powi(power);
        }
        Ok(Token::Number(if negative { -value } else { value }))
    }

    /// Parses a literal string with balanced parentheses and escapes.
    fn get_string(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        let mut depth = 1usize;
        let mut ch = self.next_char()?;

        loop {
            let Some(c) = ch else {
                break;
            };
            let mut buffered = false;

            match c {
                b'(' => {
                    depth += 1;
                    self.str_buf.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.next_char()?;
                        break;
                    }
                    self.str_buf.push(c);
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
                        b'0'..=b'7' => {
                            let mut code = (escaped - b'0') as u32;
                            buffered = true;
                            for _ in 0..2 {
                                ch = self.next_char()?;
                                match ch {
                                    Some(d @ b'0'..=b'7') => code = (code << 3) | (d - b'0') as u32,
                                    _ => break,
                                }
                            }
                            if matches!(ch, Some(b'0'..=b'7')) {
                                buffered = false;
                            }
                            self.str_buf.push((code & 0xFF) as u8);
                        }
                        b'\r' => {
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

            if !buffered {
                ch = self.next_char()?;
            }
        }

        Ok(Token::String(self.str_buf.clone()))
    }

    /// Parses `<48656c6c6f>`; an odd trailing digit is padded with zero.
    fn get_hex_string(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        let mut pending: Option<u8> = None;
        let mut ch = self.current;

        while let Some(c) = ch {
            if c == b'>' {
                self.next_char()?;
                break;
            }
            if let Some(digit) = Self::hex_value(c) {
                match pending.take() {
                    Some(high) => self.str_buf.push((high << 4) | digit),
                    None => pending = Some(digit),
                }
            }
            ch = self.next_char()?;
        }

        if let Some(high) = pending {
            self.str_buf.push(high << 4);
        }
        Ok(Token::HexString(self.str_buf.clone()))
    }

    /// Parses `/Name`, decoding `#xx` escapes.
    fn get_name(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        let mut ch = self.next_char()?;

        while let Some(c) = ch {
            if Self::is_special(c) {
                break;
            }
            if c == b'#' {
                let high = self.peek_char()?.and_then(Self::hex_value);
                if let Some(high) = high {
                    self.next_char()?;
                    let low = self.peek_char()?.and_then(Self::hex_value);
                    if let Some(low) = low {
                        self.next_char()?;
                        self.str_buf.push((high << 4) | low);
                    } else {
                        self.str_buf.push(b'#');
                        self.str_buf.push(self.current.unwrap_or(b'#'));
                    }
                } else {
                    self.str_buf.push(b'#');
                }
            } else {
                self.str_buf.push(c);
            }
            ch = self.next_char()?;
        }

        Ok(Token::Name(String::from_utf8_lossy(&self.str_buf).into_owned()))
    }

    /// Parses a bare keyword. `true`, `false` and `null` become value tokens.
    fn get_command(&mut self) -> PDFResult<Token> {
        let mut command = String::new();
        let mut ch = self.current;

        while let Some(c) = ch {
            if Self::is_special(c) {
                break;
            }
            if command.len() >= MAX_COMMAND_LENGTH {
                return Err(PDFError::Format(format!(
                    "command token too long at offset {}",
                    self.position()
                )));
            }
            command.push(c as char);
            ch = self.next_char()?;
        }

        Ok(match command.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Command(command),
        })
    }

    /// Skips the end-of-line that follows the `stream` keyword and returns the
    /// offset where stream data begins.
    pub fn skip_to_stream_data(&mut self) -> PDFResult<usize> {
        match self.current {
            Some(b'\r') => {
                if self.next_char()? == Some(b'\n') {
                    self.next_char()?;
                }
            }
            Some(b'\n') => {
                self.next_char()?;
            }
            Some(b' ') => {
                // Some writers put a space before the EOL
                while self.current == Some(b' ') {
                    self.next_char()?;
                }
                return self.skip_to_stream_data();
            }
            _ => {}
        }
        Ok(self.position())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stream::Stream;

    fn tokens(data: &[u8]) -> Vec<Token> {
        let mut stream = Stream::from_bytes(data.to_vec());
        let mut lexer = Lexer::new(&mut stream).unwrap();
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

    fn single(data: &[u8]) -> Token {
        tokens(data).into_iter().next().unwrap_or(Token::EOF)
    }

    #[test]
    fn test_character_classes() {
        for ch in [0x00, 0x09, 0x0A, 0x0C, 0x0D, 0x20] {
            assert!(Lexer::is_whitespace(ch));
        }
        for ch in b"()<>[]{}/%" {
            assert!(Lexer::is_delimiter(*ch));
        }
        assert!(!Lexer::is_whitespace(b'A'));
        assert!(!Lexer::is_delimiter(b'A'));
    }

    #[test]
    fn test_structure_tokens() {
        assert_eq!(
            tokens(b"[ ] << >>"),
            vec![
                Token::ArrayStart,
                Token::ArrayEnd,
                Token::DictStart,
                Token::DictEnd
            ]
        );
        assert_eq!(single(b""), Token::EOF);
        assert_eq!(single(b"% comment\n["), Token::ArrayStart);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(single(b"123"), Token::Number(123.0));
        assert_eq!(single(b"-42"), Token::Number(-42.0));
        assert_eq!(single(b"+7"), Token::Number(7.0));
        assert_eq!(single(b"3.25"), Token::Number(3.25));
        assert_eq!(single(b"-.5"), Token::Number(-0.5));
        assert_eq!(single(b"1.5e2"), Token::Number(150.0));
        assert_eq!(single(b"2E-1"), Token::Number(0.2));
        assert_eq!(single(b"--9"), Token::Number(-9.0));
        assert_eq!(single(b"- "), Token::Number(0.0));
        assert_eq!(
            tokens(b"1 2.5 -3"),
            vec![Token::Number(1.0), Token::Number(2.5), Token::Number(-3.0)]
        );
    }

    #[test]
    fn test_number_followed_by_operator() {
        assert_eq!(
            tokens(b"10 20 re"),
            vec![
                Token::Number(10.0),
                Token::Number(20.0),
                Token::Command("re".into())
            ]
        );
        // 'e' that does not start an exponent ends the number
        assert_eq!(
            tokens(b"5ex"),
            vec![Token::Number(5.0), Token::Command("ex".into())]
        );
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(single(b"(Hello World)"), Token::String(b"Hello World".to_vec()));
        assert_eq!(single(b"(a (nested) b)"), Token::String(b"a (nested) b".to_vec()));
        assert_eq!(single(b"(\\n\\t\\(\\))"), Token::String(b"\n\t()".to_vec()));
        assert_eq!(single(b"(\\101\\7x)"), Token::String(vec![b'A', 7, b'x']));
        assert_eq!(single(b"(line\\\ncontinued)"), Token::String(b"linecontinued".to_vec()));
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(single(b"<48656c6C6f>"), Token::HexString(b"Hello".to_vec()));
        assert_eq!(single(b"<48 65\n6c>"), Token::HexString(b"Hel".to_vec()));
        assert_eq!(single(b"<ABC>"), Token::HexString(vec![0xAB, 0xC0]));
    }

    #[test]
    fn test_names() {
        assert_eq!(single(b"/Type"), Token::Name("Type".into()));
        assert_eq!(single(b"/A#20B"), Token::Name("A B".into()));
        assert_eq!(single(b"/#2F"), Token::Name("/".into()));
        assert_eq!(
            tokens(b"/A/B"),
            vec![Token::Name("A".into()), Token::Name("B".into())]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            tokens(b"true false null obj R BT"),
            vec![
                Token::Boolean(true),
                Token::Boolean(false),
                Token::Null,
                Token::Command("obj".into()),
                Token::Command("R".into()),
                Token::Command("BT".into()),
            ]
        );
    }

    #[test]
    fn test_position_and_seek() {
        let mut stream = Stream::from_bytes(b"12 0 R foo".to_vec());
        let mut lexer = Lexer::new(&mut stream).unwrap();
        assert_eq!(lexer.position(), 0);
        lexer.get_object().unwrap();
        let mark = lexer.position();
        assert_eq!(lexer.get_object().unwrap(), Token::Number(0.0));
        lexer.seek(mark).unwrap();
        assert_eq!(lexer.get_object().unwrap(), Token::Number(0.0));
        assert_eq!(lexer.get_object().unwrap(), Token::Command("R".into()));
    }

    #[test]
    fn test_stream_data_offset() {
        let mut stream = Stream::from_bytes(b"stream\r\nDATA".to_vec());
        let mut lexer = Lexer::new(&mut stream).unwrap();
        assert_eq!(lexer.get_object().unwrap(), Token::Command("stream".into()));
        assert_eq!(lexer.skip_to_stream_data().unwrap(), 8);
    }

    #[test]
    fn test_unbalanced_paren_is_error() {
        let mut stream = Stream::from_bytes(b")".to_vec());
        let mut lexer = Lexer::new(&mut stream).unwrap();
        assert!(lexer.get_object().is_err());
    }
}
