//! Plan notation parser
//!
//! Recursive-descent parser from notation text to a [`NotationValue`]
//! tree, plus the span extraction that lifts a notation object out of the
//! prose and code fences the generation backend wraps around it.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{NotationError, NotationResult};
use super::models::{AnalyticalPlan, DashboardSpec, ForecastSpec};

/// Type tags the parser accepts at the top level
const KNOWN_TAGS: &[&str] = &["plan", "panel", "dashboard", "refusal", "forecast"];

static CODE_FENCE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[a-zA-Z]*\s*\n?(.*?)```").unwrap());

// ============================================================================
// Value Tree
// ============================================================================

/// One node of parsed notation
#[derive(Debug, Clone, PartialEq)]
pub enum NotationValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<NotationValue>),
    Object { tag: Option<String>, fields: Vec<(String, NotationValue)> },
}

impl NotationValue {
    /// Look up a field on an object node
    pub fn get(&self, name: &str) -> Option<&NotationValue> {
        match self {
            Self::Object { fields, .. } => {
                fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
            },
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Object { tag, .. } => tag.as_deref(),
            _ => None,
        }
    }
}

// ============================================================================
// Entry Points
// ============================================================================

/// Extract the outermost `@type{...}` span from surrounding prose.
///
/// The generation backend routinely wraps its output in commentary or a
/// markdown code fence; parsing only the matched span keeps that noise
/// out of the grammar.
pub fn extract_notation(text: &str) -> Option<&str> {
    if let Some(cap) = CODE_FENCE_REGEX.captures(text) {
        let fenced = cap.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if let Some(span) = tagged_span(fenced) {
            return Some(span);
        }
    }
    tagged_span(text)
}

/// Parse notation text into a value tree.
///
/// The declared type tag is checked against the known set before any
/// field-level parsing so callers can distinguish "the model invented a
/// type" from ordinary syntax damage.
pub fn parse(text: &str) -> NotationResult<NotationValue> {
    let span = extract_notation(text).ok_or(NotationError::MissingObject)?;
    let mut scanner = Scanner::new(span);
    scanner.skip_ws();

    let tag = scanner.expect_tag()?;
    if !KNOWN_TAGS.contains(&tag.as_str()) {
        return Err(NotationError::UnknownType(tag));
    }

    let value = scanner.parse_object_body(Some(tag))?;
    scanner.skip_ws();
    Ok(value)
}

/// Parse a plan (or refusal, folded into an infeasible plan) from response text
pub fn parse_plan(text: &str) -> NotationResult<AnalyticalPlan> {
    let value = parse(text)?;
    match value.tag() {
        Some("plan") => AnalyticalPlan::from_notation(&value),
        Some("refusal") => AnalyticalPlan::from_refusal(&value),
        Some(other) => Err(NotationError::UnexpectedType {
            expected: "plan",
            found: other.to_string(),
        }),
        None => Err(NotationError::MissingObject),
    }
}

/// Parse an overview dashboard from response text
pub fn parse_dashboard(text: &str) -> NotationResult<DashboardSpec> {
    let value = parse(text)?;
    match value.tag() {
        Some("dashboard") => DashboardSpec::from_notation(&value),
        Some(other) => Err(NotationError::UnexpectedType {
            expected: "dashboard",
            found: other.to_string(),
        }),
        None => Err(NotationError::MissingObject),
    }
}

/// Parse a forecast specification (`@forecast{...}`) from response text.
/// Used to decode the strategy-selection reply.
pub fn parse_forecast_spec(text: &str) -> NotationResult<ForecastSpec> {
    let value = parse(text)?;
    match value.tag() {
        Some("forecast") => ForecastSpec::from_notation(&value),
        Some(other) => Err(NotationError::UnexpectedType {
            expected: "forecast",
            found: other.to_string(),
        }),
        None => Err(NotationError::MissingObject),
    }
}

/// Locate a `@tag{...}` span with string-aware brace matching
fn tagged_span(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = None;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'@'
            && bytes[i + 1..]
                .iter()
                .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
                .count()
                > 0
        {
            let after_ident = i
                + 1
                + bytes[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphanumeric() || **c == b'_')
                    .count();
            let mut j = after_ident;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'{' {
                start = Some((i, j));
                break;
            }
        }
    }
    let (span_start, brace_start) = start?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut string_quote = b'"';
    let mut k = brace_start;
    while k < bytes.len() {
        let b = bytes[k];
        if in_string {
            if b == b'\\' {
                k += 2;
                continue;
            }
            if b == string_quote {
                in_string = false;
            }
        } else {
            match b {
                b'"' | b'\'' => {
                    in_string = true;
                    string_quote = b;
                },
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[span_start..=k]);
                    }
                },
                _ => {},
            }
        }
        k += 1;
    }
    None
}

// ============================================================================
// Scanner
// ============================================================================

struct Scanner {
    chars: Vec<char>,
    pos: usize,
}

impl Scanner {
    fn new(text: &str) -> Self {
        Self { chars: text.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.pos += 1;
        }
    }

    fn skip_ws_and_commas(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r' | ',')) {
            self.pos += 1;
        }
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Expect `@ident` and return the identifier
    fn expect_tag(&mut self) -> NotationResult<String> {
        if self.peek() != Some('@') {
            return Err(NotationError::Expected { expected: "'@' type tag", offset: self.pos });
        }
        self.pos += 1;
        let tag = self.read_ident();
        if tag.is_empty() {
            return Err(NotationError::Expected { expected: "type name", offset: self.pos });
        }
        Ok(tag)
    }

    /// Parse `{ key:value ... }` starting at the opening brace
    fn parse_object_body(&mut self, tag: Option<String>) -> NotationResult<NotationValue> {
        self.skip_ws();
        let open_at = self.pos;
        if self.bump() != Some('{') {
            return Err(NotationError::Expected { expected: "'{'", offset: open_at });
        }

        let mut fields = Vec::new();
        loop {
            self.skip_ws_and_commas();
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    break;
                },
                None => return Err(NotationError::UnmatchedBrace(open_at)),
                Some(_) => {},
            }

            let key = self.read_ident();
            if key.is_empty() {
                return Err(NotationError::Expected { expected: "field name", offset: self.pos });
            }
            self.skip_ws();
            if self.bump() != Some(':') {
                return Err(NotationError::Expected { expected: "':'", offset: self.pos });
            }
            self.skip_ws();
            let value = self.parse_value()?;
            fields.push((key, value));
        }

        Ok(NotationValue::Object { tag, fields })
    }

    fn parse_array(&mut self) -> NotationResult<NotationValue> {
        let open_at = self.pos;
        if self.bump() != Some('[') {
            return Err(NotationError::Expected { expected: "'['", offset: open_at });
        }

        let mut items = Vec::new();
        loop {
            self.skip_ws_and_commas();
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    break;
                },
                None => return Err(NotationError::UnmatchedBracket(open_at)),
                Some(_) => items.push(self.parse_value()?),
            }
        }
        Ok(NotationValue::Array(items))
    }

    fn parse_string(&mut self, quote: char) -> NotationResult<NotationValue> {
        let open_at = self.pos;
        self.pos += 1; // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(NotationError::UnterminatedString(open_at)),
                Some('\\') => match self.bump() {
                    None => return Err(NotationError::UnterminatedString(open_at)),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                },
                Some(c) if c == quote => break,
                Some(c) => out.push(c),
            }
        }
        Ok(NotationValue::Str(out))
    }

    fn parse_value(&mut self) -> NotationResult<NotationValue> {
        match self.peek() {
            None => Err(NotationError::Expected { expected: "value", offset: self.pos }),
            Some('@') => {
                let tag = self.expect_tag()?;
                self.parse_object_body(Some(tag))
            },
            Some('{') => self.parse_object_body(None),
            Some('[') => self.parse_array(),
            Some(q @ ('"' | '\'')) => self.parse_string(q),
            Some(_) => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if !c.is_whitespace() && !matches!(c, ',' | '}' | ']'))
                {
                    self.pos += 1;
                }
                let raw: String = self.chars[start..self.pos].iter().collect();
                if raw.is_empty() {
                    return Err(NotationError::Expected { expected: "value", offset: start });
                }
                Ok(classify_bare(&raw))
            },
        }
    }
}

/// Classify an unquoted token as bool, null, number, or bare string
fn classify_bare(raw: &str) -> NotationValue {
    match raw {
        "true" => return NotationValue::Bool(true),
        "false" => return NotationValue::Bool(false),
        "null" | "none" => return NotationValue::Null,
        _ => {},
    }
    if let Ok(n) = raw.parse::<i64>() {
        return NotationValue::Int(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return NotationValue::Float(f);
    }
    NotationValue::Str(raw.to_string())
}
