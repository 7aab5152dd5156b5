//! Reader for the array-literal syntax shard files are written in.
//!
//! Shards are generated as a script assigning one array literal
//! (`var searchData=[...];`). This reader accepts that prelude, single- or
//! double-quoted strings with the usual backslash escapes, numbers, `true`,
//! `false`, `null` and nested arrays with optional trailing commas, and yields
//! a [`serde_json::Value`]. Plain JSON arrays are accepted as-is.

use serde_json::{Number, Value};
use thiserror::Error;

/// Deepest array nesting accepted. Well-formed entries nest four levels.
const MAX_DEPTH: usize = 32;

/// Syntax error with the byte offset where reading stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at byte {offset}")]
pub(crate) struct SyntaxError {
    pub(crate) offset: usize,
    pub(crate) reason: String,
}

/// Read a shard script into a value tree.
pub(crate) fn read_script(src: &str) -> Result<Value, SyntaxError> {
    let mut reader = Reader::new(src);
    reader.skip_prelude()?;
    let value = reader.value()?;
    reader.skip_ws();
    if reader.peek() == Some(b';') {
        reader.pos += 1;
    }
    reader.skip_ws();
    if reader.pos < reader.src.len() {
        return Err(reader.error("unexpected trailing content"));
    }
    Ok(value)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    const fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            depth: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> SyntaxError {
        SyntaxError {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Skip an optional `var name =` assignment before the literal.
    fn skip_prelude(&mut self) -> Result<(), SyntaxError> {
        if self.src.starts_with('\u{feff}') {
            self.pos += '\u{feff}'.len_utf8();
        }
        self.skip_ws();
        let rest = &self.src[self.pos..];
        if let Some(after_var) = rest.strip_prefix("var")
            && after_var.starts_with(|c: char| c.is_whitespace())
        {
            match after_var.find('=') {
                Some(eq) => self.pos += 3 + eq + 1,
                None => return Err(self.error("assignment without '='")),
            }
        }
        self.skip_ws();
        Ok(())
    }

    fn value(&mut self) -> Result<Value, SyntaxError> {
        self.skip_ws();
        match self.peek() {
            Some(b'[') => self.array(),
            Some(quote @ (b'\'' | b'"')) => self.string(quote).map(Value::String),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b't') => self.keyword("true", Value::Bool(true)),
            Some(b'f') => self.keyword("false", Value::Bool(false)),
            Some(b'n') => self.keyword("null", Value::Null),
            Some(other) => Err(self.error(format!("unexpected character '{}'", char::from(other)))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn array(&mut self) -> Result<Value, SyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let items = self.array_items();
        self.depth -= 1;
        items
    }

    fn array_items(&mut self) -> Result<Value, SyntaxError> {
        self.pos += 1; // '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                Some(_) => return Err(self.error("expected ',' or ']'")),
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn string(&mut self, quote: u8) -> Result<String, SyntaxError> {
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(offset) = rest.find(|c: char| c == char::from(quote) || c == '\\') else {
                return Err(self.error("unterminated string"));
            };
            out.push_str(&rest[..offset]);
            self.pos += offset;

            if self.peek() == Some(quote) {
                self.pos += 1;
                return Ok(out);
            }

            // backslash escape
            self.pos += 1;
            let Some(escaped) = self.src[self.pos..].chars().next() else {
                return Err(self.error("unterminated escape"));
            };
            self.pos += escaped.len_utf8();
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                '0' => out.push('\0'),
                'x' => out.push(self.hex_escape(2)?),
                'u' => out.push(self.hex_escape(4)?),
                '\n' => {} // line continuation
                other => out.push(other),
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> Result<char, SyntaxError> {
        let hex = self
            .src
            .get(self.pos..self.pos + digits)
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| self.error("invalid hex escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|e| self.error(e.to_string()))?;
        self.pos += digits;
        char::from_u32(code).ok_or_else(|| self.error("escape is not a valid character"))
    }

    fn number(&mut self) -> Result<Value, SyntaxError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while let Some(b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-') = self.peek() {
            self.pos += 1;
        }
        let text = &self.src[start..self.pos];

        if let Ok(int) = text.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| SyntaxError {
                offset: start,
                reason: format!("invalid number '{}'", text),
            })
    }

    fn keyword(&mut self, word: &str, value: Value) -> Result<Value, SyntaxError> {
        if self.src[self.pos..].starts_with(word) {
            self.pos += word.len();
            Ok(value)
        } else {
            Err(self.error("unexpected identifier"))
        }
    }
}
