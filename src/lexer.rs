// ABOUTME: Single-pass lexer producing position-tracked tokens

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LBrack,
    RBrack,
    Colon,
    Arrow,
    Int,
    Float,
    Str,
    Symbol,
    Eof,
    Error,
}

/// A token borrowing its text out of the source buffer. String tokens hold
/// the raw bytes between the quotes; escape pairs are kept verbatim.
#[derive(Debug, Clone, Copy)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub text: &'src str,
    pub line: u32,
    pub col: u32,
}

pub struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
}

fn is_sym_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || b"+-*/<>=!?%".contains(&c)
}

fn is_sym_part(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || b"+-*/<>=!?%".contains(&c)
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Lexer { src, bytes: src.as_bytes(), pos: 0, line: 1, col: 1 }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b';') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(c) if c.is_ascii_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, end: usize, line: u32, col: u32) -> Token<'src> {
        Token { kind, text: &self.src[start..end], line, col }
    }

    pub fn next_token(&mut self) -> Token<'src> {
        self.skip_ws_and_comments();
        let (line, col) = (self.line, self.col);
        let start = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return self.make(TokenKind::Eof, start, start, line, col),
        };
        match c {
            b'[' => {
                self.advance();
                self.make(TokenKind::LBrack, start, start + 1, line, col)
            }
            b']' => {
                self.advance();
                self.make(TokenKind::RBrack, start, start + 1, line, col)
            }
            b':' => {
                self.advance();
                self.make(TokenKind::Colon, start, start + 1, line, col)
            }
            b'-' if self.peek2() == Some(b'>') => {
                self.advance();
                self.advance();
                self.make(TokenKind::Arrow, start, start + 2, line, col)
            }
            b'"' => self.lex_string(line, col),
            _ if c.is_ascii_digit() || (c == b'-' && self.peek2().is_some_and(|d| d.is_ascii_digit())) => {
                self.lex_number(start, line, col)
            }
            _ if is_sym_start(c) => {
                self.advance();
                while self.peek().is_some_and(is_sym_part) {
                    self.advance();
                }
                self.make(TokenKind::Symbol, start, self.pos, line, col)
            }
            _ => {
                // Unknown input: consume one whole UTF-8 sequence and report
                // an error token.
                self.advance();
                while self.peek().is_some_and(|b| b & 0xC0 == 0x80) {
                    self.advance();
                }
                self.make(TokenKind::Error, start, self.pos, line, col)
            }
        }
    }

    /// Strings do not terminate on end of input; whatever was collected so
    /// far is returned. A backslash consumes the following byte verbatim —
    /// escapes are passed through untranslated.
    fn lex_string(&mut self, line: u32, col: u32) -> Token<'src> {
        self.advance(); // opening quote
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            if c == b'\\' {
                self.advance();
                if self.peek().is_none() {
                    break;
                }
            }
            self.advance();
        }
        let end = self.pos;
        if self.peek() == Some(b'"') {
            self.advance();
        }
        self.make(TokenKind::Str, start, end, line, col)
    }

    fn lex_number(&mut self, start: usize, line: u32, col: u32) -> Token<'src> {
        let mut seen_dot = false;
        if self.peek() == Some(b'-') {
            self.advance();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some(b'.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            seen_dot = true;
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        let kind = if seen_dot { TokenKind::Float } else { TokenKind::Int };
        self.make(kind, start, self.pos, line, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<(TokenKind, String)> {
        let mut lx = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lx.next_token();
            if t.kind == TokenKind::Eof {
                break;
            }
            out.push((t.kind, t.text.to_string()));
        }
        out
    }

    #[test]
    fn test_brackets_and_punctuation() {
        let ts = tokens("[ ] : ->");
        assert_eq!(
            ts,
            vec![
                (TokenKind::LBrack, "[".into()),
                (TokenKind::RBrack, "]".into()),
                (TokenKind::Colon, ":".into()),
                (TokenKind::Arrow, "->".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let ts = tokens("42 -7 3.25 -0.5");
        assert_eq!(
            ts,
            vec![
                (TokenKind::Int, "42".into()),
                (TokenKind::Int, "-7".into()),
                (TokenKind::Float, "3.25".into()),
                (TokenKind::Float, "-0.5".into()),
            ]
        );
    }

    #[test]
    fn test_minus_alone_is_a_symbol() {
        let ts = tokens("- x");
        assert_eq!(ts[0], (TokenKind::Symbol, "-".into()));
        assert_eq!(ts[1], (TokenKind::Symbol, "x".into()));
    }

    #[test]
    fn test_arrow_beats_negative_number() {
        // "->" is checked before number recognition sees the '-'.
        let ts = tokens("->9");
        assert_eq!(ts[0], (TokenKind::Arrow, "->".into()));
        assert_eq!(ts[1], (TokenKind::Int, "9".into()));
    }

    #[test]
    fn test_symbols_with_operator_chars() {
        let ts = tokens("str-len set! eq? <= %");
        let names: Vec<_> = ts.iter().map(|(_, s)| s.as_str()).collect();
        assert_eq!(names, vec!["str-len", "set!", "eq?", "<=", "%"]);
        assert!(ts.iter().all(|(k, _)| *k == TokenKind::Symbol));
    }

    #[test]
    fn test_string_keeps_escapes_verbatim() {
        let ts = tokens(r#""a\nb""#);
        assert_eq!(ts, vec![(TokenKind::Str, r"a\nb".into())]);
    }

    #[test]
    fn test_unterminated_string_returns_collected_bytes() {
        let ts = tokens("\"abc");
        assert_eq!(ts, vec![(TokenKind::Str, "abc".into())]);
    }

    #[test]
    fn test_comments_are_skipped() {
        let ts = tokens("1 ; rest of line\n2");
        assert_eq!(ts, vec![(TokenKind::Int, "1".into()), (TokenKind::Int, "2".into())]);
    }

    #[test]
    fn test_positions_are_one_based() {
        let mut lx = Lexer::new("ab\n  cd");
        let a = lx.next_token();
        assert_eq!((a.line, a.col), (1, 1));
        let b = lx.next_token();
        assert_eq!((b.line, b.col), (2, 3));
    }

    #[test]
    fn test_unknown_byte_becomes_error_token() {
        let ts = tokens("@ x");
        assert_eq!(ts[0].0, TokenKind::Error);
        assert_eq!(ts[1], (TokenKind::Symbol, "x".into()));
    }

    #[test]
    fn test_true_false_are_plain_symbols() {
        let ts = tokens("true false");
        assert!(ts.iter().all(|(k, _)| *k == TokenKind::Symbol));
    }

    #[test]
    fn test_multibyte_junk_is_one_error_token() {
        let ts = tokens("é 1");
        assert_eq!(ts[0], (TokenKind::Error, "é".into()));
        assert_eq!(ts[1], (TokenKind::Int, "1".into()));
    }
}
