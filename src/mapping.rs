//! Header mapping: relabel physical channel identifiers to display names.
//!
//! The rule string uses a relaxed object syntax where keys and values may be
//! left unquoted:
//!
//! ```text
//! {cDAQ1Mod1/ai0: Temp, cDAQ1Mod1/ai1: Pressure}
//! [{ai0: Temp}, {ai0: Temperature, ai1: Flow}]
//! {"Dev1/ai0": "Inlet: upstream"}
//! ```
//!
//! A list of blocks is merged in order; later blocks win on key collisions.
//! Bare tokens run until whitespace or one of `{ } [ ] : , "`, so identifiers
//! containing `/`, `-` or `.` need no quoting. Values containing separators must
//! be written as JSON strings. Numbers and `true`/`false` are kept as their
//! literal text; `null` and nested structures are rejected.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{DaqError, Result};

/// Flat mapping from physical channel identifier to display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMapping {
    entries: HashMap<String, String>,
}

impl HeaderMapping {
    /// Parse a rule string.
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser::new(input);
        let blocks = parser.document()?;
        debug!(?blocks, "Parsed header mapping blocks");

        let mut entries = HashMap::new();
        for block in blocks {
            for (key, value) in block {
                entries.insert(key, value);
            }
        }
        debug!(merged = ?entries, "Merged header mapping");
        Ok(Self { entries })
    }

    /// Display name for `physical`, if mapped.
    pub fn get(&self, physical: &str) -> Option<&str> {
        self.entries.get(physical).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(physical, display)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Relabel channel names, preserving order and length.
    ///
    /// The full identifier is looked up first. Failing that, the part after
    /// the last `/` is used, so `{ai0: Temp}` relabels `cDAQ1Mod1/ai0`, but
    /// only when no other channel in `channels` shares that short name.
    /// Unmapped and ambiguous names are kept unchanged and logged at warn level.
    pub fn relabel(&self, channels: &[String]) -> Vec<String> {
        let mut short_counts: HashMap<&str, usize> = HashMap::new();
        for physical in channels {
            *short_counts.entry(short_name(physical)).or_default() += 1;
        }

        channels
            .iter()
            .map(|physical| {
                if let Some(display) = self.get(physical) {
                    return display.to_string();
                }
                let short = short_name(physical);
                match self.get(short) {
                    Some(display) if short_counts.get(short) == Some(&1) => display.to_string(),
                    Some(display_name) => {
                        warn!(
                            channel = %physical,
                            short_name = short,
                            display = display_name,
                            "Short name is shared by several channels, keeping physical name"
                        );
                        physical.clone()
                    }
                    None => {
                        warn!(
                            channel = %physical,
                            "Channel not in header mapping, keeping physical name"
                        );
                        physical.clone()
                    }
                }
            })
            .collect()
    }
}

fn short_name(physical: &str) -> &str {
    physical.rsplit_once('/').map_or(physical, |(_, short)| short)
}

impl FromStr for HeaderMapping {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromIterator<(String, String)> for HeaderMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Bare(&'a str),
    Quoted(String),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Comma => write!(f, "','"),
            Token::Bare(s) => write!(f, "'{}'", s),
            Token::Quoted(s) => write!(f, "\"{}\"", s),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"')
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Next token and its byte offset, or `None` at end of input.
    fn next_token(&mut self) -> Result<Option<(usize, Token<'a>)>> {
        self.skip_whitespace();
        let input = self.input;
        let start = self.pos;
        let Some(c) = input[start..].chars().next() else {
            return Ok(None);
        };

        let punct = match c {
            '{' => Some(Token::LBrace),
            '}' => Some(Token::RBrace),
            '[' => Some(Token::LBracket),
            ']' => Some(Token::RBracket),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(token) = punct {
            self.pos += 1;
            return Ok(Some((start, token)));
        }

        if c == '"' {
            return self.quoted(start).map(|s| Some((start, Token::Quoted(s))));
        }

        let rest = &input[start..];
        let len = rest.find(is_delimiter).unwrap_or(rest.len());
        self.pos += len;
        Ok(Some((start, Token::Bare(&rest[..len]))))
    }

    fn quoted(&mut self, start: usize) -> Result<String> {
        let mut escaped = false;
        for (i, c) in self.input[start + 1..].char_indices() {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => {
                    let end = start + 1 + i + 1;
                    self.pos = end;
                    return serde_json::from_str::<String>(&self.input[start..end]).map_err(|e| {
                        DaqError::MappingSyntax {
                            offset: start,
                            message: format!("invalid string literal: {}", e),
                        }
                    });
                }
                _ => escaped = false,
            }
        }
        Err(DaqError::MappingSyntax {
            offset: start,
            message: "unterminated string".to_string(),
        })
    }
}

type Block = Vec<(String, String)>;

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Option<(usize, Token<'a>)>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            lexer: Lexer::new(input),
            peeked: None,
        }
    }

    fn peek(&mut self) -> Result<Option<&(usize, Token<'a>)>> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().and_then(Option::as_ref))
    }

    fn next(&mut self) -> Result<Option<(usize, Token<'a>)>> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.lexer.next_token(),
        }
    }

    fn end_offset(&self) -> usize {
        self.lexer.input.len()
    }

    fn error(offset: usize, message: impl Into<String>) -> DaqError {
        DaqError::MappingSyntax {
            offset,
            message: message.into(),
        }
    }

    fn expect(&mut self, expected: Token<'static>) -> Result<usize> {
        match self.next()? {
            Some((offset, token)) if token == expected => Ok(offset),
            Some((offset, token)) => Err(Self::error(
                offset,
                format!("expected {}, found {}", expected, token),
            )),
            None => Err(Self::error(
                self.end_offset(),
                format!("expected {}, found end of input", expected),
            )),
        }
    }

    /// document := object | '[' (object (',' object)*)? ']'
    fn document(&mut self) -> Result<Vec<Block>> {
        let blocks = match self.peek()? {
            Some((_, Token::LBrace)) => vec![self.object()?],
            Some((_, Token::LBracket)) => self.array()?,
            Some((offset, token)) => {
                return Err(Self::error(
                    *offset,
                    format!("expected '{{' or '[', found {}", token),
                ))
            }
            None => return Err(Self::error(0, "empty header mapping")),
        };

        if let Some((offset, token)) = self.next()? {
            return Err(Self::error(offset, format!("unexpected trailing {}", token)));
        }
        Ok(blocks)
    }

    fn array(&mut self) -> Result<Vec<Block>> {
        self.expect(Token::LBracket)?;
        let mut blocks = Vec::new();
        if let Some((_, Token::RBracket)) = self.peek()? {
            self.next()?;
            return Ok(blocks);
        }
        loop {
            match self.peek()? {
                Some((_, Token::LBrace)) => blocks.push(self.object()?),
                Some((offset, token)) => {
                    return Err(Self::error(
                        *offset,
                        format!("list entries must be blocks, found {}", token),
                    ))
                }
                None => return Err(Self::error(self.end_offset(), "unterminated list")),
            }
            match self.next()? {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RBracket)) => return Ok(blocks),
                Some((offset, token)) => {
                    return Err(Self::error(offset, format!("expected ',' or ']', found {}", token)))
                }
                None => return Err(Self::error(self.end_offset(), "unterminated list")),
            }
        }
    }

    /// object := '{' (pair (',' pair)*)? '}'
    fn object(&mut self) -> Result<Block> {
        self.expect(Token::LBrace)?;
        let mut pairs = Vec::new();
        if let Some((_, Token::RBrace)) = self.peek()? {
            self.next()?;
            return Ok(pairs);
        }
        loop {
            let key = self.key()?;
            self.expect(Token::Colon)?;
            let value = self.value()?;
            pairs.push((key, value));

            match self.next()? {
                Some((_, Token::Comma)) => continue,
                Some((_, Token::RBrace)) => return Ok(pairs),
                Some((offset, token)) => {
                    return Err(Self::error(
                        offset,
                        format!("expected ',' or '}}', found {}", token),
                    ))
                }
                None => return Err(Self::error(self.end_offset(), "unterminated block")),
            }
        }
    }

    fn key(&mut self) -> Result<String> {
        match self.next()? {
            Some((_, Token::Bare(s))) => Ok(s.to_string()),
            Some((_, Token::Quoted(s))) => Ok(s),
            Some((offset, token)) => {
                Err(Self::error(offset, format!("expected key, found {}", token)))
            }
            None => Err(Self::error(self.end_offset(), "expected key, found end of input")),
        }
    }

    fn value(&mut self) -> Result<String> {
        match self.next()? {
            Some((offset, Token::Bare("null"))) => {
                Err(Self::error(offset, "null is not a valid display name"))
            }
            Some((_, Token::Bare(s))) => Ok(s.to_string()),
            Some((_, Token::Quoted(s))) => Ok(s),
            Some((offset, token @ (Token::LBrace | Token::LBracket))) => Err(Self::error(
                offset,
                format!("nested structures are not allowed, found {}", token),
            )),
            Some((offset, token)) => {
                Err(Self::error(offset, format!("expected value, found {}", token)))
            }
            None => Err(Self::error(self.end_offset(), "expected value, found end of input")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> HeaderMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_bare_single_block() {
        let m = HeaderMapping::parse("{cDAQ1Mod1/ai0: Temp, cDAQ1Mod1/ai1: Pressure}").unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("cDAQ1Mod1/ai0"), Some("Temp"));
        assert_eq!(m.get("cDAQ1Mod1/ai1"), Some("Pressure"));
    }

    #[test]
    fn test_quoted_and_bare_forms_agree() {
        let bare = HeaderMapping::parse("[{ai0: Temp}, {ai1: Flow-Rate}]").unwrap();
        let quoted = HeaderMapping::parse(r#"{"ai0": "Temp", "ai1": "Flow-Rate"}"#).unwrap();
        assert_eq!(bare, quoted);
    }

    #[test]
    fn test_later_block_wins() {
        let m = HeaderMapping::parse("[{ai0: Temp, ai1: A}, {ai0: Temperature}]").unwrap();
        assert_eq!(m, mapping(&[("ai0", "Temperature"), ("ai1", "A")]));
    }

    #[test]
    fn test_duplicate_key_in_block_last_wins() {
        let m = HeaderMapping::parse("{ai0: A, ai0: B}").unwrap();
        assert_eq!(m.get("ai0"), Some("B"));
    }

    #[test]
    fn test_literals_kept_as_text() {
        let m = HeaderMapping::parse("{ai0: 42, ai1: true, ai2: -1.5}").unwrap();
        assert_eq!(m.get("ai0"), Some("42"));
        assert_eq!(m.get("ai1"), Some("true"));
        assert_eq!(m.get("ai2"), Some("-1.5"));
    }

    #[test]
    fn test_quoted_value_with_separators() {
        let m = HeaderMapping::parse(r#"{Dev1/ai0: "Inlet: upstream, \"A\""}"#).unwrap();
        assert_eq!(m.get("Dev1/ai0"), Some(r#"Inlet: upstream, "A""#));
    }

    #[test]
    fn test_empty_blocks() {
        assert!(HeaderMapping::parse("{}").unwrap().is_empty());
        assert!(HeaderMapping::parse("[]").unwrap().is_empty());
        assert!(HeaderMapping::parse(" [ {} , { } ] ").unwrap().is_empty());
    }

    #[test]
    fn test_syntax_errors() {
        for input in [
            "",
            "ai0: Temp",
            "{ai0 Temp}",
            "{ai0: Temp",
            "{ai0: Temp,}",
            "[{ai0: Temp}, ai1]",
            "{ai0: null}",
            "{ai0: {nested: x}}",
            "{ai0: \"open}",
            "{ai0: Temp} extra",
        ] {
            let err = HeaderMapping::parse(input).unwrap_err();
            assert!(
                matches!(err, DaqError::MappingSyntax { .. }),
                "{:?} should be a syntax error, got {:?}",
                input,
                err
            );
        }
    }

    #[test]
    fn test_error_offset_points_at_token() {
        match HeaderMapping::parse("{ai0 Temp}").unwrap_err() {
            DaqError::MappingSyntax { offset, .. } => assert_eq!(offset, 5),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_relabel_exact_then_short_name() {
        let m = mapping(&[("ai0", "Temp"), ("cDAQ1Mod1/ai1", "Pressure")]);
        let names = vec![
            "cDAQ1Mod1/ai0".to_string(),
            "cDAQ1Mod1/ai1".to_string(),
            "cDAQ1Mod1/ai2".to_string(),
        ];
        assert_eq!(m.relabel(&names), vec!["Temp", "Pressure", "cDAQ1Mod1/ai2"]);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_shared_short_name_is_not_relabelled() {
        let m = HeaderMapping::parse("{ai0: Temp}").unwrap();
        let names = vec!["cDAQ1Mod1/ai0".to_string(), "cDAQ1Mod2/ai0".to_string()];
        assert_eq!(m.relabel(&names), names);
        assert!(logs_contain("Short name is shared by several channels"));
    }

    #[test]
    fn test_full_identifier_wins_over_shared_short_name() {
        let m = mapping(&[("ai0", "Temp"), ("cDAQ1Mod2/ai0", "Flow")]);
        let names = vec!["cDAQ1Mod1/ai0".to_string(), "cDAQ1Mod2/ai0".to_string()];
        assert_eq!(m.relabel(&names), vec!["cDAQ1Mod1/ai0", "Flow"]);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_merged_entries_logged_at_debug() {
        HeaderMapping::parse("[{ai0: Temp}, {ai0: Temperature}]").unwrap();
        assert!(logs_contain("Merged header mapping"));
        assert!(logs_contain("Temperature"));
    }

    #[test]
    fn test_from_str() {
        let m: HeaderMapping = "{a: b}".parse().unwrap();
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![("a", "b")]);
    }
}
