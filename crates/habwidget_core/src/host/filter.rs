//! LDAP-style filter expressions for configuration lookup.
//!
//! # Responsibility
//! - Parse filter strings such as `(service.pid=org.openhab.habpanel)`.
//! - Evaluate parsed filters against configuration properties.
//!
//! # Invariants
//! - Attribute names compare case-insensitively; values compare exactly.
//! - Multi-valued (array) properties match when any element matches.
//! - Parsing never panics; malformed input yields `FilterParseError`.

use crate::host::Properties;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static ATTRIBUTE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("attribute name pattern is valid")
});

/// Parsed configuration filter with its source text.
#[derive(Debug, Clone)]
pub struct ConfigFilter {
    source: String,
    expr: FilterExpr,
}

#[derive(Debug, Clone)]
enum FilterExpr {
    Equal { key: String, value: String },
    Present { key: String },
    Substring { key: String, pattern: Regex },
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl ConfigFilter {
    /// Parses one filter expression.
    ///
    /// # Errors
    /// - Returns `FilterParseError` for empty, unbalanced or malformed input,
    ///   and for approximate/ordering operators (`~=`, `>=`, `<=`).
    pub fn parse(source: &str) -> Result<Self, FilterParseError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(FilterParseError::Empty);
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut parser = Parser { chars, pos: 0 };
        let expr = parser.parse_filter()?;
        parser.skip_whitespace();
        if parser.pos != parser.chars.len() {
            return Err(FilterParseError::TrailingInput(parser.pos));
        }

        Ok(Self {
            source: trimmed.to_string(),
            expr,
        })
    }

    /// Filter matching the configuration object with persistent identity `pid`.
    pub fn for_pid(pid: &str) -> Self {
        Self {
            source: format!("({}={})", crate::host::SERVICE_PID_KEY, escape_value(pid)),
            expr: FilterExpr::Equal {
                key: crate::host::SERVICE_PID_KEY.to_string(),
                value: pid.to_string(),
            },
        }
    }

    /// Returns the normalized source text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates this filter against `properties`.
    pub fn matches(&self, properties: &Properties) -> bool {
        self.expr.matches(properties)
    }
}

impl FromStr for ConfigFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ConfigFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl FilterExpr {
    fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::Equal { key, value } => lookup(properties, key)
                .is_some_and(|found| any_value(found, |s| s == value.as_str())),
            Self::Present { key } => lookup(properties, key).is_some_and(|found| !found.is_null()),
            Self::Substring { key, pattern } => lookup(properties, key)
                .is_some_and(|found| any_value(found, |s| pattern.is_match(s))),
            Self::And(items) => items.iter().all(|item| item.matches(properties)),
            Self::Or(items) => items.iter().any(|item| item.matches(properties)),
            Self::Not(inner) => !inner.matches(properties),
        }
    }
}

fn lookup<'a>(properties: &'a Properties, key: &str) -> Option<&'a Value> {
    properties
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

fn any_value(value: &Value, predicate: impl Fn(&str) -> bool + Copy) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => predicate(s),
        Value::Array(items) => items.iter().any(|item| any_value(item, predicate)),
        other => predicate(&other.to_string()),
    }
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn parse_filter(&mut self) -> Result<FilterExpr, FilterParseError> {
        self.skip_whitespace();
        self.expect('(')?;
        self.skip_whitespace();
        let expr = match self.peek() {
            Some('&') => {
                self.pos += 1;
                FilterExpr::And(self.parse_list()?)
            }
            Some('|') => {
                self.pos += 1;
                FilterExpr::Or(self.parse_list()?)
            }
            Some('!') => {
                self.pos += 1;
                FilterExpr::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_item()?,
            None => return Err(FilterParseError::UnexpectedEnd),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(expr)
    }

    fn parse_list(&mut self) -> Result<Vec<FilterExpr>, FilterParseError> {
        let start = self.pos;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('(') => items.push(self.parse_filter()?),
                _ => break,
            }
        }
        if items.is_empty() {
            return Err(FilterParseError::EmptyFilterList(start));
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<FilterExpr, FilterParseError> {
        let start = self.pos;
        let mut attribute = String::new();
        loop {
            match self.peek() {
                Some('=') => break,
                Some(c @ ('~' | '>' | '<')) => {
                    return Err(FilterParseError::UnsupportedOperator(format!("{c}=")));
                }
                Some('(' | ')') | None => {
                    return Err(FilterParseError::MissingOperator(
                        self.chars[start..self.pos].iter().collect(),
                    ));
                }
                Some(c) => {
                    attribute.push(c);
                    self.pos += 1;
                }
            }
        }
        self.pos += 1;

        let key = attribute.trim().to_string();
        if !ATTRIBUTE_NAME.is_match(&key) {
            return Err(FilterParseError::InvalidAttribute(key));
        }

        // Segments between unescaped `*` wildcards.
        let mut segments = vec![String::new()];
        loop {
            match self.peek() {
                Some(')') => break,
                Some('(') => return Err(FilterParseError::UnexpectedChar(self.pos, '(')),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or(FilterParseError::UnexpectedEnd)?;
                    push_char(&mut segments, escaped);
                    self.pos += 1;
                }
                Some('*') => {
                    segments.push(String::new());
                    self.pos += 1;
                }
                Some(c) => {
                    push_char(&mut segments, c);
                    self.pos += 1;
                }
                None => return Err(FilterParseError::UnexpectedEnd),
            }
        }

        if segments.len() == 1 {
            let value = segments.pop().unwrap_or_default();
            return Ok(FilterExpr::Equal { key, value });
        }
        if segments.iter().all(String::is_empty) && segments.len() == 2 {
            return Ok(FilterExpr::Present { key });
        }

        let body = segments
            .iter()
            .map(|segment| regex::escape(segment))
            .collect::<Vec<_>>()
            .join(".*");
        let pattern = Regex::new(&format!("^(?s:{body})$"))
            .map_err(|err| FilterParseError::InvalidPattern(err.to_string()))?;
        Ok(FilterExpr::Substring { key, pattern })
    }

    fn expect(&mut self, expected: char) -> Result<(), FilterParseError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(FilterParseError::UnexpectedChar(self.pos, c)),
            None => Err(FilterParseError::UnexpectedEnd),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }
}

fn push_char(segments: &mut [String], c: char) {
    if let Some(last) = segments.last_mut() {
        last.push(c);
    }
}

/// Filter syntax errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterParseError {
    Empty,
    UnexpectedEnd,
    UnexpectedChar(usize, char),
    TrailingInput(usize),
    EmptyFilterList(usize),
    MissingOperator(String),
    UnsupportedOperator(String),
    InvalidAttribute(String),
    InvalidPattern(String),
}

impl Display for FilterParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "filter must not be empty"),
            Self::UnexpectedEnd => write!(f, "filter ended unexpectedly"),
            Self::UnexpectedChar(pos, c) => {
                write!(f, "unexpected character `{c}` at position {pos}")
            }
            Self::TrailingInput(pos) => write!(f, "unexpected trailing input at position {pos}"),
            Self::EmptyFilterList(pos) => write!(f, "empty filter list at position {pos}"),
            Self::MissingOperator(item) => write!(f, "filter item has no operator: {item}"),
            Self::UnsupportedOperator(op) => write!(f, "filter operator is unsupported: {op}"),
            Self::InvalidAttribute(name) => write!(f, "filter attribute is invalid: `{name}`"),
            Self::InvalidPattern(message) => write!(f, "filter wildcard is invalid: {message}"),
        }
    }
}

impl Error for FilterParseError {}
