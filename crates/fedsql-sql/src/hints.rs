//! Optimizer hint blocks
//!
//! The statement parser treats `/*+ ... */` as an ordinary comment, so hint
//! blocks are recovered by scanning the source text directly. A block counts
//! as a hint only when it follows the `SELECT` keyword (whitespace and other
//! hint blocks may sit in between). Hints are indexed by the position of
//! their `SELECT` keyword so the tree builder can attach them to the right
//! query block.
//!
//! Positions follow the statement tokenizer: lines and columns start at 1,
//! and every character (not byte) advances the column.

use crate::parser::SyntaxError;
use fedsql_core::{LiteralValue, SourceSpan, SqlNode};
use std::collections::HashMap;
use tracing::trace;

/// Hints found in one SQL text, keyed by `SELECT` keyword position
#[derive(Debug, Default)]
pub struct HintIndex {
    by_select: HashMap<(usize, usize), Vec<SqlNode>>,
}

impl HintIndex {
    /// Remove and return the hints attached to the `SELECT` at `(line, column)`
    pub fn take(&mut self, line: usize, column: usize) -> Vec<SqlNode> {
        self.by_select.remove(&(line, column)).unwrap_or_default()
    }

    /// Number of `SELECT` keywords with hints not yet taken
    pub fn pending(&self) -> usize {
        self.by_select.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_select.is_empty()
    }

    fn push(&mut self, select: (usize, usize), hints: Vec<SqlNode>) {
        self.by_select.entry(select).or_default().extend(hints);
    }
}

/// Scan `sql` for hint blocks
///
/// Malformed blocks are reported as syntax errors; well-formed blocks in the
/// same text are still indexed.
pub fn scan(sql: &str) -> (HintIndex, Vec<SyntaxError>) {
    let mut scanner = Scanner::new(sql);
    scanner.run();
    (scanner.index, scanner.errors)
}

/// A character with its source position
#[derive(Debug, Clone, Copy)]
struct Positioned {
    ch: char,
    line: usize,
    column: usize,
}

fn positioned(sql: &str) -> Vec<Positioned> {
    let mut line = 1;
    let mut column = 1;
    let mut out = Vec::with_capacity(sql.len());

    for ch in sql.chars() {
        out.push(Positioned { ch, line, column });
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    out
}

struct Scanner {
    chars: Vec<Positioned>,
    pos: usize,
    /// Position of a `SELECT` keyword that may still receive hint blocks
    pending_select: Option<(usize, usize)>,
    index: HintIndex,
    errors: Vec<SyntaxError>,
}

impl Scanner {
    fn new(sql: &str) -> Self {
        Self {
            chars: positioned(sql),
            pos: 0,
            pending_select: None,
            index: HintIndex::default(),
            errors: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|p| p.ch)
    }

    fn run(&mut self) {
        while let Some(ch) = self.peek(0) {
            match ch {
                '\'' | '"' | '`' => {
                    self.pending_select = None;
                    self.skip_quoted(ch);
                }
                '-' if self.peek(1) == Some('-') => self.skip_line_comment(),
                '/' if self.peek(1) == Some('*') => {
                    if self.peek(2) == Some('+') && self.pending_select.is_some() {
                        self.hint_block();
                    } else {
                        self.skip_block_comment();
                    }
                }
                c if c.is_whitespace() => self.pos += 1,
                c if is_word_char(c) => self.word(),
                _ => {
                    self.pending_select = None;
                    self.pos += 1;
                }
            }
        }
    }

    fn word(&mut self) {
        let start = self.chars[self.pos];
        let mut text = String::new();
        while let Some(c) = self.peek(0).filter(|c| is_word_char(*c)) {
            text.push(c);
            self.pos += 1;
        }

        self.pending_select = if text.eq_ignore_ascii_case("select") {
            Some((start.line, start.column))
        } else {
            None
        };
    }

    /// Skip a quoted run; a doubled quote character is an escape
    fn skip_quoted(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == quote {
                if self.peek(0) == Some(quote) {
                    self.pos += 1;
                } else {
                    return;
                }
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek(0) {
            self.pos += 1;
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while self.pos < self.chars.len() {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn hint_block(&mut self) {
        let open = self.chars[self.pos];
        self.pos += 3;
        let body_start = self.pos;

        let mut body_end = None;
        while self.pos < self.chars.len() {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                body_end = Some(self.pos);
                self.pos += 2;
                break;
            }
            self.pos += 1;
        }

        let Some(body_end) = body_end else {
            self.errors.push(SyntaxError::new(
                open.line,
                open.column - 1,
                "unterminated hint block",
            ));
            return;
        };

        let Some(select) = self.pending_select else {
            return;
        };

        let body = &self.chars[body_start..body_end];
        trace!(line = open.line, column = open.column, "scanning hint block");

        match HintBodyParser::new(body, (open.line, open.column)).parse() {
            Ok(hints) => self.index.push(select, hints),
            Err(error) => self.errors.push(error),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[derive(Debug, Clone, PartialEq)]
enum HintToken {
    Name(String),
    Quoted(String),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct SpannedToken {
    token: HintToken,
    span: SourceSpan,
}

/// Parses `name[(param, ...)] [,] name...`
struct HintBodyParser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    /// Position just after the body, for errors at end of block
    end: (usize, usize),
    lex_error: Option<SyntaxError>,
}

impl HintBodyParser {
    fn new(body: &[Positioned], open: (usize, usize)) -> Self {
        let end = body
            .last()
            .map(|p| (p.line, p.column + 1))
            .unwrap_or((open.0, open.1 + 3));

        let mut parser = Self {
            tokens: Vec::new(),
            pos: 0,
            end,
            lex_error: None,
        };
        parser.lex(body);
        parser
    }

    fn lex(&mut self, body: &[Positioned]) {
        let mut i = 0;
        while i < body.len() {
            let start = body[i];
            let single = |token| SpannedToken {
                token,
                span: SourceSpan::point(start.line, start.column),
            };

            match start.ch {
                c if c.is_whitespace() => {
                    i += 1;
                    continue;
                }
                '(' => self.tokens.push(single(HintToken::LParen)),
                ')' => self.tokens.push(single(HintToken::RParen)),
                ',' => self.tokens.push(single(HintToken::Comma)),
                quote @ ('\'' | '"') => {
                    let mut text = String::from(quote);
                    let mut j = i + 1;
                    let mut closed = false;
                    while j < body.len() {
                        text.push(body[j].ch);
                        if body[j].ch == quote {
                            closed = true;
                            break;
                        }
                        j += 1;
                    }
                    if !closed {
                        self.lex_error = Some(SyntaxError::new(
                            start.line,
                            start.column - 1,
                            "unterminated quoted hint parameter",
                        ));
                        return;
                    }
                    let last = body[j];
                    self.tokens.push(SpannedToken {
                        token: HintToken::Quoted(text),
                        span: SourceSpan::new(start.line, start.column, last.line, last.column),
                    });
                    i = j + 1;
                    continue;
                }
                _ => {
                    let mut text = String::new();
                    let mut j = i;
                    while j < body.len() && !is_separator(body[j].ch) {
                        text.push(body[j].ch);
                        j += 1;
                    }
                    let last = body[j - 1];
                    self.tokens.push(SpannedToken {
                        token: HintToken::Name(text),
                        span: SourceSpan::new(start.line, start.column, last.line, last.column),
                    });
                    i = j;
                    continue;
                }
            }
            i += 1;
        }
    }

    fn parse(mut self) -> Result<Vec<SqlNode>, SyntaxError> {
        if let Some(error) = self.lex_error.take() {
            return Err(error);
        }
        if self.tokens.is_empty() {
            return Err(self.error_at_end("empty hint block"));
        }

        let mut hints = vec![self.hint()?];
        while self.pos < self.tokens.len() {
            if self.check(&HintToken::Comma) {
                self.pos += 1;
            }
            hints.push(self.hint()?);
        }

        Ok(hints)
    }

    fn hint(&mut self) -> Result<SqlNode, SyntaxError> {
        let (name, name_span) = match self.next() {
            Some(SpannedToken {
                token: HintToken::Name(name),
                span,
            }) if is_hint_name(&name) => (name, span),
            Some(other) => return Err(unexpected(&other, "expected hint name")),
            None => return Err(self.error_at_end("expected hint name")),
        };

        let mut parameters = Vec::new();
        let mut span = name_span;

        if self.check(&HintToken::LParen) {
            self.pos += 1;
            loop {
                let param = match self.next() {
                    Some(SpannedToken {
                        token: HintToken::Name(text) | HintToken::Quoted(text),
                        span,
                    }) => reduce_parameter(&text, span),
                    Some(other) => return Err(unexpected(&other, "expected hint parameter")),
                    None => return Err(self.error_at_end("expected hint parameter")),
                };
                parameters.push(param);

                match self.next() {
                    Some(SpannedToken {
                        token: HintToken::Comma,
                        ..
                    }) => continue,
                    Some(SpannedToken {
                        token: HintToken::RParen,
                        span: close,
                    }) => {
                        span = span.merge(&close);
                        break;
                    }
                    Some(other) => return Err(unexpected(&other, "expected ',' or ')'")),
                    None => return Err(self.error_at_end("expected ')'")),
                }
            }
        }

        Ok(SqlNode::hint(name, parameters, span))
    }

    fn next(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &HintToken) -> bool {
        self.tokens.get(self.pos).map(|t| &t.token) == Some(expected)
    }

    fn error_at_end(&self, message: &str) -> SyntaxError {
        SyntaxError::new(self.end.0, self.end.1.saturating_sub(1), message)
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ',')
}

fn is_hint_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn unexpected(token: &SpannedToken, expected: &str) -> SyntaxError {
    let found = match &token.token {
        HintToken::Name(text) | HintToken::Quoted(text) => text.clone(),
        HintToken::LParen => "(".to_string(),
        HintToken::RParen => ")".to_string(),
        HintToken::Comma => ",".to_string(),
    };
    SyntaxError::new(
        token.span.start_line,
        token.span.start_column.saturating_sub(1),
        format!("{}, found: {}", expected, found),
    )
}

/// Reduce a hint parameter to a literal or a bare identifier
///
/// Tried in order: integer, float, boolean, null. Float parsing accepts
/// `inf`, `infinity` and `nan` in any case. Anything else becomes a
/// single-part identifier with quote characters stripped.
pub fn reduce_parameter(text: &str, span: SourceSpan) -> SqlNode {
    let text = text.trim_matches(|c| c == '\'' || c == '"');

    if let Ok(value) = text.parse::<i64>() {
        return SqlNode::literal(LiteralValue::Integer(value), span);
    }
    if let Ok(value) = text.parse::<f64>() {
        return SqlNode::literal(LiteralValue::Decimal(value), span);
    }
    if text.eq_ignore_ascii_case("true") {
        return SqlNode::literal(LiteralValue::Boolean(true), span);
    }
    if text.eq_ignore_ascii_case("false") {
        return SqlNode::literal(LiteralValue::Boolean(false), span);
    }
    if text.eq_ignore_ascii_case("null") {
        return SqlNode::literal(LiteralValue::Null, span);
    }

    SqlNode::identifier(vec![text.to_string()], span)
}
