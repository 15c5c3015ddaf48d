// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::{Error, Result};

use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;
use std::rc::Rc;

struct SourceInternal {
    pub file: String,
    pub contents: String,
    pub lines: Vec<(u32, u32)>,
}

/// Expression text together with its line table, used for diagnostics.
#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.file.fmt(f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        let max_size = u32::MAX as usize - 2;
        if contents.len() > max_size {
            return Err(Error::Syntax {
                expression: String::new(),
                line: 0,
                col: 0,
                message: format!("{file} exceeds maximum allowed expression size {max_size}"),
            });
        }
        let mut lines = vec![];
        let mut prev_ch = ' ';
        let mut prev_pos = 0u32;
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                let end = match prev_ch {
                    '\r' => prev_pos,
                    _ => i as u32,
                };
                lines.push((start, end));
                start = i as u32 + 1;
            }
            prev_ch = ch;
            prev_pos = i as u32;
        }

        if (start as usize) < contents.len() {
            lines.push((start, contents.len() as u32));
        } else if contents.is_empty() {
            lines.push((0, 0));
        } else {
            let s = (contents.len() - 1) as u32;
            lines.push((s, s));
        }
        Ok(Self {
            src: Rc::new(SourceInternal {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn file(&self) -> &String {
        &self.src.file
    }

    pub fn contents(&self) -> &String {
        &self.src.contents
    }

    pub fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        if idx < self.src.lines.len() {
            let (start, end) = self.src.lines[idx];
            &self.src.contents[start as usize..end as usize]
        } else {
            ""
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line as usize > self.src.lines.len() || line == 0 {
            return format!("{}: invalid line {} specified", self.src.file, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = (col as usize).saturating_sub(1);

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
		{:<line_num_width$}| {}\n\
		{:<line_num_width$}| {:<col_spaces$}^\n\
		{}: {}",
            self.src.file,
            line,
            col,
            "",
            line,
            self.line(line - 1),
            "",
            "",
            kind,
            msg
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> Error {
        Error::Syntax {
            expression: self.src.contents.clone(),
            line,
            col,
            message: self.message(line, col, "error", msg),
        }
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = if t.len() > max {
            (&t[0..max], "...")
        } else {
            (t.as_str(), "")
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    /// Literal text outside of `${ }` and `#{ }`.
    Text,
    /// `${` or `#{`.
    Open,
    Symbol,
    String,
    Number,
    Ident,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

/// Tokenizer for composite expressions.
///
/// The lexer has two modes. `next_text` reads literal text up to the next
/// `${`/`#{` opener. `next_token` reads expression tokens. The parser picks
/// the mode; after the `}` that closes an eval segment it switches back to
/// text.
#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn advance(&mut self) {
        if let Some((_, ch)) = self.iter.next() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn at_open(&mut self) -> bool {
        matches!(self.peek().1, '$' | '#') && self.peekahead(1).1 == '{'
    }

    /// Read literal text. `\${` and `\#{` stay escaped in the span; the
    /// parser unescapes them.
    pub fn next_text(&mut self) -> Result<Token> {
        let (start, chr) = self.peek();
        let (line, col) = (self.line, self.col);
        if chr == '\x00' && start == self.source.contents().len() {
            return Ok(Token(TokenKind::Eof, self.span(line, col, start, start)));
        }
        if self.at_open() {
            self.advance();
            self.advance();
            return Ok(Token(TokenKind::Open, self.span(line, col, start, start + 2)));
        }
        loop {
            let (offset, ch) = self.peek();
            if offset == self.source.contents().len() || self.at_open() {
                break;
            }
            if ch == '\\' && matches!(self.peekahead(1).1, '$' | '#') && self.peekahead(2).1 == '{'
            {
                self.advance();
                self.advance();
                self.advance();
                continue;
            }
            self.advance();
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Text, self.span(line, col, start, end)))
    }

    fn read_ident(&mut self) -> Result<Token> {
        let start = self.peek().0;
        let (line, col) = (self.line, self.col);
        loop {
            let ch = self.peek().1;
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Ident, self.span(line, col, start, end)))
    }

    fn read_digits(&mut self) {
        while self.peek().1.is_ascii_digit() {
            self.advance();
        }
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.peek().0;
        let (line, col) = (self.line, self.col);
        self.read_digits();

        // A fraction needs at least one digit after the dot.
        if self.peek().1 == '.' && self.peekahead(1).1.is_ascii_digit() {
            self.advance();
            self.read_digits();
        }

        let ch = self.peek().1;
        if ch == 'e' || ch == 'E' {
            self.advance();
            if matches!(self.peek().1, '+' | '-') {
                self.advance();
            }
            if !self.peek().1.is_ascii_digit() {
                return Err(self.source.error(self.line, self.col, "invalid number"));
            }
            self.read_digits();
        }

        let ch = self.peek().1;
        if ch == '_' || ch.is_ascii_alphanumeric() {
            return Err(self.source.error(self.line, self.col, "invalid number"));
        }

        let end = self.peek().0;
        Ok(Token(TokenKind::Number, self.span(line, col, start, end)))
    }

    /// Strings are delimited by `'` or `"`. The span excludes the quotes and
    /// keeps escapes, see [`unescape_string`].
    fn read_string(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        let quote = self.peek().1;
        self.advance();
        let start = self.peek().0;
        loop {
            let (offset, ch) = self.peek();
            match ch {
                _ if ch == quote => break,
                '\x00' if offset == self.source.contents().len() => {
                    return Err(self
                        .source
                        .error(line, col, &format!("unmatched {quote}")));
                }
                '\\' => {
                    self.advance();
                    match self.peek().1 {
                        '\\' | '\'' | '"' => self.advance(),
                        _ => {
                            return Err(self.source.error(
                                self.line,
                                self.col,
                                "invalid escape sequence",
                            ))
                        }
                    }
                }
                _ => self.advance(),
            }
        }
        let end = self.peek().0;
        self.advance();
        Ok(Token(TokenKind::String, self.span(line, col + 1, start, end)))
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek().1, ' ' | '\t' | '\r' | '\n') {
            self.advance();
        }
    }

    fn symbol(&mut self, len: usize) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        for _ in 0..len {
            self.advance();
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Symbol, self.span(line, col, start, end)))
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_ws();

        let (start, chr) = self.peek();
        let next = self.peekahead(1).1;

        match chr {
            '\x00' if start == self.source.contents().len() => {
                Ok(Token(TokenKind::Eof, self.span(self.line, self.col, start, start)))
            }
            // grouping characters
            '{' | '}' | '[' | ']' | '(' | ')'
            // arith operator
            | '+' | '-' | '*' | '/' | '%'
            // separators
            | ',' | '.' | ':' | '?' => self.symbol(1),
            // == != <= >=
            '=' | '!' | '<' | '>' if next == '=' => self.symbol(2),
            '=' | '!' | '<' | '>' => self.symbol(1),
            '&' if next == '&' => self.symbol(2),
            '|' if next == '|' => self.symbol(2),
            '"' | '\'' => self.read_string(),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_alphabetic() || chr == '_' || chr == '$' => self.read_ident(),
            _ => Err(self.source.error(self.line, self.col, "invalid character")),
        }
    }
}

/// Resolve the escapes of a string literal span.
pub fn unescape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Resolve `\${` and `\#{` in literal text.
pub fn unescape_text(text: &str) -> String {
    text.replace("\\${", "${").replace("\\#{", "#{")
}
