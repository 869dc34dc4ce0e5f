//! Tokenizer for filter expressions.

use super::FilterError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Arithmetic operators between operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare word: keyword or unquoted identifier.
    Word(String),
    /// `"double quoted"` identifier, unescaped.
    QuotedIdent(String),
    /// `'single quoted'` string, unescaped.
    Str(String),
    /// Unsigned numeric literal text. A leading sign is an [`TokenKind::Arith`].
    Number(String),
    Op(CompareOp),
    Arith(ArithmeticOp),
    LParen,
    RParen,
    Comma,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the input.
    pub position: usize,
}

impl Token {
    /// Case-insensitive keyword match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

/// Split `input` into tokens, ending with [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                pos += 1;
                continue;
            }
            b'(' => {
                pos += 1;
                TokenKind::LParen
            }
            b')' => {
                pos += 1;
                TokenKind::RParen
            }
            b',' => {
                pos += 1;
                TokenKind::Comma
            }
            b'=' => {
                pos += 1;
                TokenKind::Op(CompareOp::Eq)
            }
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                TokenKind::Op(CompareOp::Ne)
            }
            b'<' => match bytes.get(pos + 1) {
                Some(b'>') => {
                    pos += 2;
                    TokenKind::Op(CompareOp::Ne)
                }
                Some(b'=') => {
                    pos += 2;
                    TokenKind::Op(CompareOp::Lte)
                }
                _ => {
                    pos += 1;
                    TokenKind::Op(CompareOp::Lt)
                }
            },
            b'>' => {
                if bytes.get(pos + 1) == Some(&b'=') {
                    pos += 2;
                    TokenKind::Op(CompareOp::Gte)
                } else {
                    pos += 1;
                    TokenKind::Op(CompareOp::Gt)
                }
            }
            b'\'' => {
                let (text, end) = quoted(input, pos, '\'')?;
                pos = end;
                TokenKind::Str(text)
            }
            b'"' => {
                let (text, end) = quoted(input, pos, '"')?;
                pos = end;
                TokenKind::QuotedIdent(text)
            }
            b'+' | b'-' | b'*' | b'/' => {
                pos += 1;
                TokenKind::Arith(match c {
                    b'+' => ArithmeticOp::Add,
                    b'-' => ArithmeticOp::Sub,
                    b'*' => ArithmeticOp::Mul,
                    _ => ArithmeticOp::Div,
                })
            }
            b'0'..=b'9' | b'.' => {
                let end = number_end(bytes, pos)
                    .ok_or_else(|| FilterError::syntax(pos, "malformed number"))?;
                pos = end;
                TokenKind::Number(input[start..end].to_string())
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                TokenKind::Word(input[start..pos].to_string())
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(FilterError::syntax(pos, format!("unexpected character '{ch}'")));
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: bytes.len(),
    });
    Ok(tokens)
}

/// Read a quoted run starting at `start`; a doubled quote is an escaped quote.
fn quoted(input: &str, start: usize, quote: char) -> Result<(String, usize), FilterError> {
    let mut text = String::new();
    let mut chars = input[start + 1..].char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        if ch == quote {
            if matches!(chars.peek(), Some((_, next)) if *next == quote) {
                chars.next();
                text.push(quote);
                continue;
            }
            return Ok((text, start + 1 + offset + 1));
        }
        text.push(ch);
    }

    Err(FilterError::syntax(start, "unterminated quoted text"))
}

/// End offset of a number starting at `start`, or `None` if malformed.
///
/// Accepts digits with an optional fraction and an optional exponent.
/// At least one mantissa digit is required.
fn number_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut pos = start;
    let mut digits = 0;
    while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
        pos += 1;
        digits += 1;
    }
    if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
            pos += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        pos += 1;
        if matches!(bytes.get(pos), Some(b'+' | b'-')) {
            pos += 1;
        }
        let exp_start = pos;
        while bytes.get(pos).is_some_and(u8::is_ascii_digit) {
            pos += 1;
        }
        if pos == exp_start {
            return None;
        }
    }

    // "12abc" is not a number followed by a word.
    if bytes
        .get(pos)
        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
    {
        return None;
    }
    Some(pos)
}
