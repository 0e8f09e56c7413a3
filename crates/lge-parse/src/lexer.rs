use crate::token::{keyword, Tok, TokKind};
use lge_ast::location::Location;

/// Convenience wrapper: scan the whole input, ending with exactly one `Eof`.
pub fn tokenize(file: &str, src: &str) -> Vec<Tok> {
    let mut lex = Lexer::new(file, src);
    let mut toks = Vec::new();
    loop {
        let t = lex.next_tok();
        let eof = t.is_eof();
        toks.push(t);
        if eof {
            return toks;
        }
    }
}

pub struct Lexer<'a> {
    file: &'a str,
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a str, src: &'a str) -> Self {
        Self {
            file,
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        let b = *self.src.get(self.pos)?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if !is_utf8_continuation(b) {
            self.col += 1;
        }
        Some(b)
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn here(&self) -> Location {
        Location::new(self.line, self.col, self.file)
    }

    fn text(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.bump();
        }
    }

    pub fn next_tok(&mut self) -> Tok {
        self.skip_ws();
        let loc = self.here();
        let start = self.pos;
        let tok = |kind, text: &str| Tok {
            kind,
            text: text.to_string(),
            location: loc.clone(),
        };
        let Some(b) = self.bump() else {
            return tok(TokKind::Eof, "");
        };

        // 2-char operators first
        match (b, self.peek()) {
            (b'-', Some(b'>')) => {
                self.bump();
                return tok(TokKind::Arrow, "->");
            }
            (b'<', Some(b'=')) => {
                self.bump();
                return tok(TokKind::LessEqual, "<=");
            }
            (b'>', Some(b'=')) => {
                self.bump();
                return tok(TokKind::GreaterEqual, ">=");
            }
            (b'=', Some(b'=')) => {
                self.bump();
                return tok(TokKind::EqualEqual, "==");
            }
            (b'!', Some(b'=')) => {
                self.bump();
                return tok(TokKind::NotEqual, "!=");
            }
            _ => {}
        }

        // 1-char punctuation/operators
        let single = match b {
            b'(' => Some(TokKind::LParen),
            b')' => Some(TokKind::RParen),
            b',' => Some(TokKind::Comma),
            b':' => Some(TokKind::Colon),
            b'+' => Some(TokKind::Plus),
            b'-' => Some(TokKind::Minus),
            b'*' => Some(TokKind::Multiply),
            b'/' => Some(TokKind::Divide),
            b'=' => Some(TokKind::Equals),
            b'<' => Some(TokKind::LessThan),
            b'>' => Some(TokKind::GreaterThan),
            b'\\' => Some(TokKind::Backslash),
            b'\n' => Some(TokKind::Newline),
            _ => None,
        };
        if let Some(k) = single {
            let text = self.text(start);
            return tok(k, &text);
        }

        match b {
            b'!' => tok(TokKind::Unknown, "Unexpected character '!'"),
            b'"' => self.string(loc.clone()),
            b'#' => {
                while !matches!(self.peek(), None | Some(b'\n')) {
                    self.bump();
                }
                let text = self.text(start);
                tok(TokKind::Comment, &text)
            }
            b if b.is_ascii_digit() => {
                let mut kind = TokKind::IntLiteral;
                while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                    self.bump();
                }
                // `1.` without a following digit stays an int
                if self.peek() == Some(b'.') && matches!(self.peek2(), Some(d) if d.is_ascii_digit())
                {
                    kind = TokKind::FloatLiteral;
                    self.bump();
                    while matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
                        self.bump();
                    }
                }
                let text = self.text(start);
                tok(kind, &text)
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_') {
                    self.bump();
                }
                let text = self.text(start);
                let kind = keyword(&text).unwrap_or(TokKind::Identifier);
                tok(kind, &text)
            }
            _ => {
                // swallow the rest of a multi-byte character
                while matches!(self.peek(), Some(c) if is_utf8_continuation(c)) {
                    self.bump();
                }
                tok(TokKind::Unknown, "Unexpected character")
            }
        }
    }

    fn string(&mut self, loc: Location) -> Tok {
        let mut buf = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return Tok {
                    kind: TokKind::Unknown,
                    text: "Unterminated string".to_string(),
                    location: loc,
                };
            };
            match b {
                b'"' => break,
                b'\\' => {
                    let Some(esc) = self.bump() else {
                        continue;
                    };
                    buf.push(match esc {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'"' => b'"',
                        b'\\' => b'\\',
                        other => other,
                    });
                }
                other => buf.push(other),
            }
        }
        Tok {
            kind: TokKind::StringLiteral,
            text: String::from_utf8_lossy(&buf).into_owned(),
            location: loc,
        }
    }
}

fn is_utf8_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}
