//! CybroScript lexer.
//!
//! [`Scanner`] walks the raw source bytes once and yields
//! `Result<Token, CybroError>` items. Every stream ends with a single `EOF`
//! token, and the iterator is fused after it. A bad byte produces an error
//! item and scanning carries on from the next byte, so one pass reports every
//! lexical problem in a file. [`scan`] drains a scanner into separate token
//! and error lists.
//!
//! Lexemes recognised:
//!
//! | kind | forms |
//! |------|-------|
//! | punctuation | `( ) { } , . - + ; *` and `/` |
//! | comparison | `! != = == < <= > >=` |
//! | min / max | `~` and `~~` |
//! | comments | `// ...` to end of line, `/* ... */` (no nesting) |
//! | strings | `"..."` with no escapes; may contain newlines |
//! | numbers | digits with an optional `.digits` tail, read as `f64` |
//! | names | `[A-Za-z_][A-Za-z0-9_]*`, keywords looked up in [`KEYWORDS`] |
//!
//! A block comment with no closing `*/` swallows the rest of the file without
//! an error. Newlines inside comments and strings still bump the line count.
//!
//! ```rust
//! use cybro::scanner::scan;
//!
//! let (tokens, errors) = scan("print 123; // example");
//! assert!(errors.is_empty());
//! assert_eq!(tokens.len(), 4);
//! ```

use crate::error::{CybroError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::{memchr, memchr2};
use phf::phf_map;
use std::iter::FusedIterator;

/// Reserved words.  `nyl` is an alternate spelling of `nil`.
pub static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"break"  => TokenType::BREAK,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"let"    => TokenType::LET,
    b"nil"    => TokenType::NIL,
    b"nyl"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Scan a whole source string, returning every token (ending in `EOF`) and
/// every lexical error encountered along the way.
pub fn scan(src: &str) -> (Vec<Token>, Vec<CybroError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<CybroError> = Vec::new();

    for result in Scanner::new(src.as_bytes()) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}

/// Cursor over CybroScript source bytes; iterate it to get tokens.
pub struct Scanner<'a> {
    src: &'a [u8],
    /// First byte of the lexeme being scanned.
    start: usize,
    /// Next byte to read; `len + 1` after `EOF` has been emitted.
    curr: usize,
    line: usize,
    /// Kind set by `scan_token`, taken by `next`.
    pending: Option<TokenType>,
}

impl<'a> Scanner<'a> {
    /// Start at line 1, byte 0 of `src`.
    #[inline]
    pub fn new(src: &'a [u8]) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            pending: None,
        }
    }

    // ── cursor ────────────────────────────────────────────────────────────

    #[inline(always)]
    const fn len(&self) -> usize {
        self.src.len()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.len()
    }

    /// Consume the byte under the cursor.  Callers check `is_at_end` first.
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.src[self.curr];
        self.curr += 1;
        b
    }

    /// Byte under the cursor, or `0` once the source is exhausted.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.src[self.curr]
        }
    }

    /// Byte after the cursor (`0` past the end).  Used for `.` lookahead in numbers.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.len() {
            0
        } else {
            self.src[self.curr + 1]
        }
    }

    /// Second half of a two‑byte operator: take `expected` if it is next.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Owned text of `src[from..to]`; invalid UTF‑8 comes back lossy.
    fn text(&self, from: usize, to: usize) -> String {
        String::from_utf8_lossy(&self.src[from..to]).into_owned()
    }

    // ── lexemes ───────────────────────────────────────────────────────────

    /// Consume one lexeme.  A real token leaves its kind in `pending`;
    /// whitespace and comments leave `pending` empty.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        match b {
            // punctuation
            b'(' => self.pending = Some(TokenType::LEFT_PAREN),
            b')' => self.pending = Some(TokenType::RIGHT_PAREN),
            b'{' => self.pending = Some(TokenType::LEFT_BRACE),
            b'}' => self.pending = Some(TokenType::RIGHT_BRACE),
            b',' => self.pending = Some(TokenType::COMMA),
            b'.' => self.pending = Some(TokenType::DOT),
            b'-' => self.pending = Some(TokenType::MINUS),
            b'+' => self.pending = Some(TokenType::PLUS),
            b';' => self.pending = Some(TokenType::SEMICOLON),
            b'*' => self.pending = Some(TokenType::STAR),

            // `x` or `x=` (and `~` / `~~`)
            b'!' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };

                self.pending = Some(tt);
            }

            b'=' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };

                self.pending = Some(tt);
            }

            b'<' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };

                self.pending = Some(tt);
            }

            b'>' => {
                let tt = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };

                self.pending = Some(tt);
            }

            b'~' => {
                let tt = if self.match_byte(b'~') {
                    TokenType::MAX
                } else {
                    TokenType::MIN
                };

                self.pending = Some(tt);
            }

            // blanks
            b' ' | b'\r' | b'\t' => {
                return Ok(());
            }

            b'\n' => {
                self.line += 1;

                return Ok(());
            }

            b'/' => {
                if self.match_byte(b'/') {
                    // Stop on the '\n' so the blank arm counts it.
                    if let Some(pos) = memchr(b'\n', &self.src[self.curr..]) {
                        self.curr += pos;
                    } else {
                        self.curr = self.len();
                    }

                    return Ok(());
                }

                if self.match_byte(b'*') {
                    self.skip_block_comment();

                    return Ok(());
                }

                self.pending = Some(TokenType::SLASH);
            }

            b'"' => {
                return self.parse_string();
            }

            b'0'..=b'9' => {
                self.parse_number();
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            _ => {
                // One error per non-ASCII char, not per byte.
                if b >= 0x80 {
                    while !self.is_at_end() && (self.peek() & 0xC0) == 0x80 {
                        self.advance();
                    }
                }

                let bad: String = self.text(self.start, self.curr);

                return Err(CybroError::lex(
                    self.line,
                    format!("at '{}'", bad),
                    format!("Unexpected character: {}", bad),
                ));
            }
        }

        Ok(())
    }

    /// Skip a `/* ... */` comment whose opening delimiter is already consumed.
    fn skip_block_comment(&mut self) {
        loop {
            match memchr2(b'*', b'\n', &self.src[self.curr..]) {
                None => {
                    self.curr = self.len();
                    return;
                }

                Some(pos) => {
                    self.curr += pos;

                    if self.advance() == b'\n' {
                        self.line += 1;
                    } else if self.match_byte(b'/') {
                        return;
                    }
                }
            }
        }
    }

    /// Rest of a `"` string.  The literal value excludes both quotes.
    fn parse_string(&mut self) -> Result<()> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.advance() == b'\n' {
                self.line += 1;
            }
        }

        if self.is_at_end() {
            return Err(CybroError::lex(self.line, "at end", "Unterminated string."));
        }

        self.advance(); // closing quote

        let s: String = self.text(self.start + 1, self.curr - 1);

        self.pending = Some(TokenType::STRING(s));

        Ok(())
    }

    /// `123` or `3.14`.  A trailing `.` with no digit after it is left for the
    /// next token.
    fn parse_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // Only ASCII digits and one '.' were consumed, so parsing cannot fail.
        let n: f64 = self.text(self.start, self.curr).parse::<f64>().unwrap_or(0.0);

        self.pending = Some(TokenType::NUMBER(n));
    }

    fn parse_identifier(&mut self) {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let slice: &[u8] = &self.src[self.start..self.curr];

        let tt: TokenType = KEYWORDS
            .get(slice)
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER);

        self.pending = Some(tt);
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.curr <= self.len() {
            if self.curr == self.len() {
                self.curr += 1;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
            }

            self.start = self.curr;
            self.pending = None;

            if let Err(e) = self.scan_token() {
                return Some(Err(e));
            }

            if let Some(tt) = self.pending.take() {
                let lexeme: String = self.text(self.start, self.curr);
                debug!("Scanned token ({:?}) on line {}", tt, self.line);

                return Some(Ok(Token::new(tt, lexeme, self.line)));
            }
        }

        None
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
