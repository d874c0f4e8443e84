//! Tokenizer for generated Python source.
//!
//! Produces a flat token stream with line numbers plus `Newline`, `Indent`
//! and `Dedent` markers for logical lines and blocks. It never evaluates
//! anything. String literals keep their raw text; [`StrLit::value`] decodes
//! escapes on request.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Name(String),
    Number(String),
    Str(StrLit),
    Op(String),
    Open(char),
    Close(char),
    Newline,
    Indent,
    Dedent,
}

/// A string literal: lowercased prefix and the raw text between the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrLit {
    pub prefix: String,
    pub raw: String,
}

impl StrLit {
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.prefix.contains('r')
    }

    #[must_use]
    pub fn is_bytes(&self) -> bool {
        self.prefix.contains('b')
    }

    /// `f`, `rf` and `fr` literals, whose `{...}` fields are expressions.
    #[must_use]
    pub fn is_format(&self) -> bool {
        self.prefix.contains('f')
    }

    /// Literal value with backslash escapes decoded. Raw literals are
    /// returned as written; unknown escapes keep their backslash.
    #[must_use]
    pub fn value(&self) -> String {
        if self.is_raw() {
            return self.raw.clone();
        }
        decode_escapes(&self.raw)
    }
}

fn decode_escapes(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '\\' || i + 1 == chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let escape = chars[i + 1];
        i += 2;
        match escape {
            '\n' => {}
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut digits = escape.to_string();
                while digits.len() < 3 && i < chars.len() && matches!(chars[i], '0'..='7') {
                    digits.push(chars[i]);
                    i += 1;
                }
                push_code(&mut out, &digits, 8);
            }
            'x' | 'u' | 'U' => {
                let width = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars[i..].iter().take(width).collect();
                if digits.len() == width && digits.chars().all(|c| c.is_ascii_hexdigit()) {
                    push_code(&mut out, &digits, 16);
                    i += width;
                } else {
                    out.push('\\');
                    out.push(escape);
                }
            }
            '\\' | '\'' | '"' => out.push(escape),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn push_code(out: &mut String, digits: &str, radix: u32) {
    if let Some(c) = u32::from_str_radix(digits, radix).ok().and_then(char::from_u32) {
        out.push(c);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Name(name) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_op(&self, op: &str) -> bool {
        matches!(&self.kind, TokenKind::Op(o) if o == op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line {})", self.message, self.line)
    }
}

impl std::error::Error for SyntaxError {}

const OPS_3: &[&str] = &["**=", "//=", ">>=", "<<=", "..."];
const OPS_2: &[&str] = &[
    "**", "//", "<<", ">>", "<=", ">=", "==", "!=", "->", ":=", "+=", "-=", "*=", "/=", "%=",
    "&=", "|=", "^=", "@=",
];
const OPS_1: &str = "+-*/%@&|^~<>=.,:;";

const STRING_PREFIXES: &[&str] = &[
    "r", "u", "b", "f", "br", "rb", "fr", "rf",
];

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
    indents: Vec<usize>,
    brackets: Vec<(char, usize)>,
    at_line_start: bool,
}

/// Tokenize `source`, failing on the first lexical error.
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let normalized = source.replace("\r\n", "\n").replace('\r', "\n");
    let mut lexer = Lexer {
        chars: normalized.chars().collect(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
        indents: vec![0],
        brackets: Vec::new(),
        at_line_start: true,
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, line: usize) {
        self.tokens.push(Token { kind, line });
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        while self.pos < self.chars.len() {
            if self.at_line_start && self.brackets.is_empty() {
                if !self.indentation()? {
                    continue;
                }
            }
            self.next_token()?;
        }

        if let Some((open, line)) = self.brackets.last() {
            return Err(SyntaxError::new(format!("'{open}' was never closed"), *line));
        }
        self.end_logical_line();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, self.line);
        }
        Ok(())
    }

    /// Measure leading whitespace. Returns `false` for blank or comment lines.
    fn indentation(&mut self) -> Result<bool, SyntaxError> {
        let mut column = 0usize;
        while let Some(c) = self.peek(0) {
            match c {
                ' ' => column += 1,
                '\t' => column += 8 - column % 8,
                '\x0c' => column = 0,
                _ => break,
            }
            self.pos += 1;
        }

        match self.peek(0) {
            None => return Ok(false),
            Some('\n') => {
                self.pos += 1;
                self.line += 1;
                return Ok(false);
            }
            Some('#') => {
                self.skip_comment();
                return Ok(false);
            }
            _ => {}
        }

        self.at_line_start = false;
        let current = self.indents.last().copied().unwrap_or(0);
        if column > current {
            self.indents.push(column);
            self.push(TokenKind::Indent, self.line);
        } else if column < current {
            while self.indents.last().is_some_and(|&level| level > column) {
                self.indents.pop();
                self.push(TokenKind::Dedent, self.line);
            }
            if self.indents.last().copied() != Some(column) {
                return Err(SyntaxError::new(
                    "unindent does not match any outer indentation level",
                    self.line,
                ));
            }
        }
        Ok(true)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn end_logical_line(&mut self) {
        let needs_newline = self.tokens.last().is_some_and(|t| {
            !matches!(
                t.kind,
                TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
            )
        });
        if needs_newline {
            self.push(TokenKind::Newline, self.line);
        }
    }

    fn next_token(&mut self) -> Result<(), SyntaxError> {
        let Some(c) = self.peek(0) else {
            return Ok(());
        };
        let line = self.line;

        match c {
            ' ' | '\t' | '\x0c' => self.pos += 1,
            '#' => self.skip_comment(),
            '\n' => {
                if self.brackets.is_empty() {
                    self.end_logical_line();
                    self.at_line_start = true;
                }
                self.pos += 1;
                self.line += 1;
            }
            '\\' => {
                if self.peek(1) == Some('\n') {
                    self.pos += 2;
                    self.line += 1;
                } else {
                    return Err(SyntaxError::new(
                        "unexpected character after line continuation character",
                        line,
                    ));
                }
            }
            '\'' | '"' => self.string(0)?,
            '(' | '[' | '{' => {
                self.brackets.push((c, line));
                self.push(TokenKind::Open(c), line);
                self.pos += 1;
            }
            ')' | ']' | '}' => {
                match self.brackets.pop() {
                    Some((open, _)) if closing_for(open) == c => {}
                    Some((open, _)) => {
                        return Err(SyntaxError::new(
                            format!("closing parenthesis '{c}' does not match opening parenthesis '{open}'"),
                            line,
                        ));
                    }
                    None => return Err(SyntaxError::new(format!("unmatched '{c}'"), line)),
                }
                self.push(TokenKind::Close(c), line);
                self.pos += 1;
            }
            c if c.is_ascii_digit() => self.number(),
            '.' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => self.number(),
            c if c.is_alphabetic() || c == '_' => {
                if let Some(prefix_len) = self.string_prefix() {
                    self.string(prefix_len)?;
                } else {
                    self.name();
                }
            }
            _ => self.operator()?,
        }
        Ok(())
    }

    fn string_prefix(&self) -> Option<usize> {
        for len in [2usize, 1] {
            let candidate: String = self.chars[self.pos..]
                .iter()
                .take(len)
                .collect::<String>()
                .to_lowercase();
            if candidate.chars().count() == len
                && STRING_PREFIXES.contains(&candidate.as_str())
                && matches!(self.peek(len), Some('\'' | '"'))
            {
                return Some(len);
            }
        }
        None
    }

    fn string(&mut self, prefix_len: usize) -> Result<(), SyntaxError> {
        let start_line = self.line;
        let prefix: String = self.chars[self.pos..self.pos + prefix_len]
            .iter()
            .collect::<String>()
            .to_lowercase();
        self.pos += prefix_len;
        let Some(quote) = self.peek(0) else {
            return Err(SyntaxError::new("unterminated string literal", start_line));
        };
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        self.pos += if triple { 3 } else { 1 };

        let mut content = String::new();
        loop {
            let Some(c) = self.peek(0) else {
                let message = if triple {
                    "unterminated triple-quoted string literal"
                } else {
                    "unterminated string literal"
                };
                return Err(SyntaxError::new(message, start_line));
            };

            if c == '\\' {
                content.push(c);
                if let Some(next) = self.peek(1) {
                    content.push(next);
                    if next == '\n' {
                        self.line += 1;
                    }
                    self.pos += 2;
                } else {
                    self.pos += 1;
                }
                continue;
            }

            if triple {
                if c == quote && self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.pos += 3;
                    break;
                }
                if c == '\n' {
                    self.line += 1;
                }
            } else if c == '\n' {
                return Err(SyntaxError::new("unterminated string literal", start_line));
            } else if c == quote {
                self.pos += 1;
                break;
            }

            content.push(c);
            self.pos += 1;
        }

        self.push(TokenKind::Str(StrLit { prefix, raw: content }), start_line);
        Ok(())
    }

    fn number(&mut self) {
        let line = self.line;
        let start = self.pos;
        let hex = self.peek(0) == Some('0') && matches!(self.peek(1), Some('x' | 'X'));
        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.pos += 1;
                if !hex && matches!(c, 'e' | 'E') && matches!(self.peek(0), Some('+' | '-')) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Number(text), line);
    }

    fn name(&mut self) {
        let line = self.line;
        let start = self.pos;
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(TokenKind::Name(text), line);
    }

    fn operator(&mut self) -> Result<(), SyntaxError> {
        let line = self.line;
        for (len, table) in [(3usize, OPS_3), (2, OPS_2)] {
            let candidate: String = self.chars[self.pos..].iter().take(len).collect();
            if table.contains(&candidate.as_str()) {
                self.pos += len;
                self.push(TokenKind::Op(candidate), line);
                return Ok(());
            }
        }
        let Some(c) = self.peek(0) else {
            return Ok(());
        };
        if OPS_1.contains(c) {
            self.pos += 1;
            self.push(TokenKind::Op(c.to_string()), line);
            return Ok(());
        }
        Err(SyntaxError::new(format!("invalid character '{c}'"), line))
    }
}
