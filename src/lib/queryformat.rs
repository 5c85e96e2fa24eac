//! RPM-style query formats.
//!
//! A query format is literal text interleaved with tag directives:
//!
//! - `%{NAME}` renders a tag, `%-20{NAME}` / `%20{NAME}` pad it to a width
//!   (left- or right-aligned)
//! - `%{=NAME}` always renders the first element, `%{#NAME}` renders the element count
//! - `%{SIZE:hex}`, `:octal` and `:shescape` change how a value is printed
//! - `[...]` repeats its contents once per element of the arrays it references
//! - `%|EPOCH?{%{EPOCH}:}:{}|` renders one branch or the other depending on
//!   whether a tag is present
//! - `\n`, `\t` and the other C escapes, and `%%` for a literal percent sign
//!
//! Formats are compiled once with [`QueryFormat::parse`] and evaluated per header.
//! A missing tag renders as `(none)`; an array tag outside an iterator renders its
//! first element.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::pipeline::Formatter;
use crate::rpmheader::tags::tag_by_name;
use crate::rpmheader::{Header, TagValue};

/// Text rendered for a tag the header does not carry.
pub const MISSING_VALUE: &[u8] = b"(none)";

/// Errors from compiling or evaluating a query format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryFormatError {
    #[error("unknown tag: \"{0}\"")]
    UnknownTag(String),

    #[error("empty tag name at byte {0}")]
    EmptyTag(usize),

    #[error("unknown modifier: \"{0}\"")]
    UnknownModifier(String),

    #[error("unterminated {what} starting at byte {pos}")]
    Unterminated { what: &'static str, pos: usize },

    #[error("unexpected '{found}' at byte {pos}")]
    Unexpected { found: char, pos: usize },

    #[error("nested iterator at byte {0}")]
    NestedIterator(usize),

    #[error("array iterator used with different sized arrays: {tag} has {found} elements, expected {expected}")]
    ArraySizeMismatch { tag: String, expected: usize, found: usize },

    #[error("{modifier} format used on non-numeric tag {tag}")]
    NotNumeric { tag: String, modifier: &'static str },

    #[error("array iterator used without an array tag")]
    NoArrayInIterator,
}

type Result<T> = std::result::Result<T, QueryFormatError>;

/// How a value is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    Hex,
    Octal,
    Shescape,
}

impl Modifier {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "hex" => Ok(Self::Hex),
            "octal" => Ok(Self::Octal),
            "shescape" => Ok(Self::Shescape),
            _ => Err(QueryFormatError::UnknownModifier(name.to_string())),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Hex => "hex",
            Self::Octal => "octal",
            Self::Shescape => "shescape",
        }
    }
}

/// Which part of a tag's value a directive renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selector {
    /// The current iterator element, or the first one outside an iterator.
    Element,
    /// Always the first element (`=`).
    First,
    /// The number of elements (`#`).
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagField {
    tag: u32,
    name: String,
    selector: Selector,
    modifier: Option<Modifier>,
    width: usize,
    left_align: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(Vec<u8>),
    Tag(TagField),
    Array(Vec<Token>),
    Conditional { tag: u32, present: Vec<Token>, absent: Vec<Token> },
}

/// A compiled query format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFormat {
    source: String,
    tokens: Vec<Token>,
}

impl QueryFormat {
    /// Compile a query format.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tags or modifiers and for unterminated or
    /// malformed directives.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser { src: source.as_bytes(), pos: 0, in_array: false };
        let tokens = parser.parse_sequence(None)?;
        Ok(Self { source: source.to_string(), tokens })
    }

    /// The format text this was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Append the rendering of `header` to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if iterated arrays differ in size, if a numeric modifier is
    /// applied to non-numeric data, or if an iterator references no array.
    pub fn render(&self, header: &Header, out: &mut Vec<u8>) -> Result<()> {
        render_sequence(&self.tokens, header, None, out)
    }
}

impl FromStr for QueryFormat {
    type Err = QueryFormatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for QueryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Formatter<Header> for QueryFormat {
    type Error = QueryFormatError;

    fn format(&self, record: &Header, out: &mut Vec<u8>) -> Result<()> {
        self.render(record, out)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn unescape(c: u8) -> u8 {
    match c {
        b'n' => b'\n',
        b't' => b'\t',
        b'r' => b'\r',
        b'a' => 0x07,
        b'b' => 0x08,
        b'f' => 0x0c,
        b'v' => 0x0b,
        other => other,
    }
}

fn flush_literal(tokens: &mut Vec<Token>, literal: &mut Vec<u8>) {
    if !literal.is_empty() {
        tokens.push(Token::Literal(std::mem::take(literal)));
    }
}

struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
    in_array: bool,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8, what: &'static str, start: usize) -> Result<()> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(QueryFormatError::Unexpected { found: char::from(b), pos: self.pos }),
            None => Err(QueryFormatError::Unterminated { what, pos: start }),
        }
    }

    /// Consume bytes up to (not including) the first one matching `stop`.
    fn take_until(&mut self, stop: impl Fn(u8) -> bool) -> Option<(String, u8)> {
        let start = self.pos;
        let len = self.src[start..].iter().position(|&b| stop(b))?;
        self.pos += len;
        let text = String::from_utf8_lossy(&self.src[start..start + len]).into_owned();
        Some((text, self.src[self.pos]))
    }

    /// Parse tokens until `end` (consumed) or, at top level, the end of input.
    fn parse_sequence(&mut self, end: Option<u8>) -> Result<Vec<Token>> {
        let start = self.pos.saturating_sub(1);
        let mut tokens = Vec::new();
        let mut literal = Vec::new();

        while let Some(b) = self.peek() {
            if Some(b) == end {
                self.pos += 1;
                flush_literal(&mut tokens, &mut literal);
                return Ok(tokens);
            }
            match b {
                b'\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            self.pos += 1;
                            literal.push(unescape(c));
                        }
                        None => literal.push(b'\\'),
                    }
                }
                b'%' if self.src.get(self.pos + 1) == Some(&b'%') => {
                    self.pos += 2;
                    literal.push(b'%');
                }
                b'%' => {
                    flush_literal(&mut tokens, &mut literal);
                    tokens.push(self.parse_directive()?);
                }
                b'[' => {
                    if self.in_array {
                        return Err(QueryFormatError::NestedIterator(self.pos));
                    }
                    flush_literal(&mut tokens, &mut literal);
                    self.pos += 1;
                    self.in_array = true;
                    let inner = self.parse_sequence(Some(b']'))?;
                    self.in_array = false;
                    tokens.push(Token::Array(inner));
                }
                b']' => return Err(QueryFormatError::Unexpected { found: ']', pos: self.pos }),
                _ => {
                    self.pos += 1;
                    literal.push(b);
                }
            }
        }

        match end {
            None => {
                flush_literal(&mut tokens, &mut literal);
                Ok(tokens)
            }
            Some(b']') => Err(QueryFormatError::Unterminated { what: "iterator", pos: start }),
            Some(_) => Err(QueryFormatError::Unterminated { what: "conditional", pos: start }),
        }
    }

    /// Parse a directive starting at `%`.
    fn parse_directive(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;

        let left_align = self.eat(b'-');
        let digits_start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let width = std::str::from_utf8(&self.src[digits_start..self.pos])
            .ok()
            .and_then(|digits| digits.parse().ok())
            .unwrap_or(0);

        match self.peek() {
            Some(b'{') => {
                self.pos += 1;
                self.parse_tag(start, width, left_align)
            }
            Some(b'|') => {
                self.pos += 1;
                self.parse_conditional(start)
            }
            Some(b) => Err(QueryFormatError::Unexpected { found: char::from(b), pos: self.pos }),
            None => Err(QueryFormatError::Unterminated { what: "directive", pos: start }),
        }
    }

    fn resolve(name: &str, pos: usize) -> Result<u32> {
        if name.is_empty() {
            return Err(QueryFormatError::EmptyTag(pos));
        }
        tag_by_name(name).ok_or_else(|| QueryFormatError::UnknownTag(name.to_string()))
    }

    /// Parse `{[=|#]TAG[:modifier]}` with the opening brace already consumed.
    fn parse_tag(&mut self, start: usize, width: usize, left_align: bool) -> Result<Token> {
        let selector = if self.eat(b'=') {
            Selector::First
        } else if self.eat(b'#') {
            Selector::Count
        } else {
            Selector::Element
        };

        let name_pos = self.pos;
        let (name, delimiter) = self
            .take_until(|b| b == b'}' || b == b':')
            .ok_or(QueryFormatError::Unterminated { what: "tag", pos: start })?;
        self.pos += 1;

        let modifier = if delimiter == b':' {
            let (modifier, _) = self
                .take_until(|b| b == b'}')
                .ok_or(QueryFormatError::Unterminated { what: "tag", pos: start })?;
            self.pos += 1;
            Some(Modifier::parse(&modifier)?)
        } else {
            None
        };

        let tag = Self::resolve(&name, name_pos)?;
        Ok(Token::Tag(TagField { tag, name, selector, modifier, width, left_align }))
    }

    /// Parse `TAG?{present}[:{absent}]|` with the opening `%|` already consumed.
    fn parse_conditional(&mut self, start: usize) -> Result<Token> {
        let name_pos = self.pos;
        let (name, _) = self
            .take_until(|b| b == b'?')
            .ok_or(QueryFormatError::Unterminated { what: "conditional", pos: start })?;
        self.pos += 1;
        let tag = Self::resolve(&name, name_pos)?;

        self.expect(b'{', "conditional", start)?;
        let present = self.parse_sequence(Some(b'}'))?;
        let absent = if self.eat(b':') {
            self.expect(b'{', "conditional", start)?;
            self.parse_sequence(Some(b'}'))?
        } else {
            Vec::new()
        };
        self.expect(b'|', "conditional", start)?;

        Ok(Token::Conditional { tag, present, absent })
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn render_sequence(
    tokens: &[Token],
    header: &Header,
    element: Option<usize>,
    out: &mut Vec<u8>,
) -> Result<()> {
    for token in tokens {
        match token {
            Token::Literal(bytes) => out.extend_from_slice(bytes),
            Token::Tag(field) => render_tag(field, header, element, out)?,
            Token::Conditional { tag, present, absent } => {
                let branch = if header.contains(*tag) { present } else { absent };
                render_sequence(branch, header, element, out)?;
            }
            Token::Array(inner) => {
                for i in 0..iteration_count(inner, header)? {
                    render_sequence(inner, header, Some(i), out)?;
                }
            }
        }
    }
    Ok(())
}

/// Tags an iterator steps through: every per-element tag it references.
fn iterated_fields<'a>(tokens: &'a [Token], fields: &mut Vec<&'a TagField>) {
    for token in tokens {
        match token {
            Token::Tag(field) if field.selector == Selector::Element => fields.push(field),
            Token::Conditional { present, absent, .. } => {
                iterated_fields(present, fields);
                iterated_fields(absent, fields);
            }
            _ => {}
        }
    }
}

/// Number of passes an iterator makes: the common length of its arrays.
///
/// Single-element values are repeated on every pass; absent tags do not count.
fn iteration_count(tokens: &[Token], header: &Header) -> Result<usize> {
    let mut fields = Vec::new();
    iterated_fields(tokens, &mut fields);
    if fields.is_empty() {
        return Err(QueryFormatError::NoArrayInIterator);
    }

    let lengths: Vec<(&TagField, usize)> = fields
        .into_iter()
        .filter_map(|field| header.get(field.tag).map(|value| (field, value.len())))
        .collect();
    let count = lengths.iter().map(|&(_, len)| len).max().unwrap_or(0);

    if let Some(&(field, found)) = lengths.iter().find(|&&(_, len)| len > 1 && len != count) {
        return Err(QueryFormatError::ArraySizeMismatch {
            tag: field.name.clone(),
            expected: count,
            found,
        });
    }
    Ok(count)
}

fn render_tag(
    field: &TagField,
    header: &Header,
    element: Option<usize>,
    out: &mut Vec<u8>,
) -> Result<()> {
    let value = header.get(field.tag);
    let mut text = Vec::new();

    match (&value, field.selector) {
        (_, Selector::Count) => {
            let count = value.as_ref().map_or(0, TagValue::len);
            text.extend_from_slice(count.to_string().as_bytes());
        }
        (None, _) => text.extend_from_slice(MISSING_VALUE),
        (Some(value), selector) => {
            let index = match (selector, element) {
                (Selector::Element, Some(i)) if value.len() > 1 => i,
                _ => 0,
            };
            render_element(field, value, index, &mut text)?;
        }
    }

    pad(&text, field.width, field.left_align, out);
    Ok(())
}

fn render_element(field: &TagField, value: &TagValue<'_>, index: usize, text: &mut Vec<u8>) -> Result<()> {
    let not_numeric = |modifier: Modifier| QueryFormatError::NotNumeric {
        tag: field.name.clone(),
        modifier: modifier.name(),
    };

    match value {
        TagValue::Integers(values) => {
            let Some(&n) = values.get(index) else {
                text.extend_from_slice(MISSING_VALUE);
                return Ok(());
            };
            let rendered = match field.modifier {
                Some(Modifier::Hex) => format!("{n:x}"),
                Some(Modifier::Octal) => format!("{n:o}"),
                Some(Modifier::Shescape) | None => n.to_string(),
            };
            text.extend_from_slice(rendered.as_bytes());
        }
        TagValue::Strings(values) => {
            let Some(s) = values.get(index) else {
                text.extend_from_slice(MISSING_VALUE);
                return Ok(());
            };
            match field.modifier {
                Some(m @ (Modifier::Hex | Modifier::Octal)) => return Err(not_numeric(m)),
                Some(Modifier::Shescape) => shell_quote(s, text),
                None => text.extend_from_slice(s),
            }
        }
        TagValue::Binary(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            match field.modifier {
                Some(Modifier::Octal) => return Err(not_numeric(Modifier::Octal)),
                Some(Modifier::Shescape) => shell_quote(hex.as_bytes(), text),
                Some(Modifier::Hex) | None => text.extend_from_slice(hex.as_bytes()),
            }
        }
    }
    Ok(())
}

/// Wrap in single quotes, escaping embedded single quotes as `'\''`.
fn shell_quote(s: &[u8], out: &mut Vec<u8>) {
    out.push(b'\'');
    for &b in s {
        if b == b'\'' {
            out.extend_from_slice(b"'\\''");
        } else {
            out.push(b);
        }
    }
    out.push(b'\'');
}

fn pad(text: &[u8], width: usize, left_align: bool, out: &mut Vec<u8>) {
    let fill = width.saturating_sub(text.len());
    if !left_align {
        out.resize(out.len() + fill, b' ');
    }
    out.extend_from_slice(text);
    if left_align {
        out.resize(out.len() + fill, b' ');
    }
}
