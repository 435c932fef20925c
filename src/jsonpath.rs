//! JSONPath subset used by `wait_for` conditions
//!
//! Supports the expressions people write for `kubectl wait --for=jsonpath=...`:
//!
//! - `{.status.phase}`, `.status.phase`, `$.status.phase`, `status.phase`
//! - `.metadata.labels['app.kubernetes.io/name']`
//! - `.status.conditions[0].type`, negative indices from the end
//! - `.status.conditions[*].status`
//! - `.status.conditions[?(@.type=="Ready")].status` (`==` and `!=`)

use crate::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
    Filter {
        path: Vec<String>,
        negate: bool,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    expression: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let fail = |message: &str| Error::JsonPath {
            expression: expression.to_string(),
            message: message.to_string(),
        };

        let mut input = expression.trim();
        if let Some(inner) = input.strip_prefix('{') {
            input = inner
                .strip_suffix('}')
                .ok_or_else(|| fail("unbalanced braces"))?
                .trim();
        }
        input = input.strip_prefix('$').unwrap_or(input);
        if input.is_empty() {
            return Err(fail("empty expression"));
        }

        let chars: Vec<char> = input.chars().collect();
        let mut segments = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    i += 1;
                    if chars.get(i) == Some(&'.') {
                        return Err(fail("recursive descent is not supported"));
                    }
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    let field: String = chars[start..i].iter().collect();
                    if field == "*" {
                        segments.push(Segment::Wildcard);
                    } else if !field.is_empty() {
                        segments.push(Segment::Field(field));
                    } else if i < chars.len() && chars[i] != '[' {
                        return Err(fail("empty field name"));
                    }
                }
                '[' => {
                    let end = find_closing_bracket(&chars, i).ok_or_else(|| fail("unclosed ["))?;
                    let inner: String = chars[i + 1..end].iter().collect();
                    segments.push(parse_bracket(inner.trim()).map_err(|m| fail(&m))?);
                    i = end + 1;
                }
                _ => {
                    // leading bare field, e.g. `status.phase`
                    let start = i;
                    while i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        i += 1;
                    }
                    segments.push(Segment::Field(chars[start..i].iter().collect()));
                }
            }
        }

        Ok(Self {
            expression: expression.to_string(),
            segments,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// All values the expression selects from `root`
    pub fn query<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                match segment {
                    Segment::Field(field) => {
                        if let Some(v) = node.get(field.as_str()) {
                            next.push(v);
                        }
                    }
                    Segment::Index(index) => {
                        if let Some(items) = node.as_array() {
                            let resolved = if *index < 0 {
                                items.len() as i64 + index
                            } else {
                                *index
                            };
                            if resolved >= 0 {
                                if let Some(v) = items.get(resolved as usize) {
                                    next.push(v);
                                }
                            }
                        }
                    }
                    Segment::Wildcard => match node {
                        Value::Array(items) => next.extend(items.iter()),
                        Value::Object(entries) => next.extend(entries.values()),
                        _ => {}
                    },
                    Segment::Filter {
                        path,
                        negate,
                        value,
                    } => {
                        if let Some(items) = node.as_array() {
                            for item in items {
                                let selected = path
                                    .iter()
                                    .try_fold(item, |v, field| v.get(field.as_str()))
                                    .map(stringify);
                                let equal = selected.as_deref() == Some(value.as_str());
                                if equal != *negate {
                                    next.push(item);
                                }
                            }
                        }
                    }
                }
            }
            current = next;
        }
        current
    }

    /// True when any selected value renders as `expected`
    pub fn matches(&self, root: &Value, expected: &str) -> bool {
        self.query(root).into_iter().any(|v| stringify(v) == expected)
    }

    /// The first selected value, rendered as a string
    pub fn first(&self, root: &Value) -> Option<String> {
        self.query(root).first().map(|v| stringify(v))
    }
}

/// Render a JSON value the way kubectl prints JSONPath results
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn find_closing_bracket(chars: &[char], open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on the first `==` or `!=` outside of a quoted literal.
fn split_comparison(body: &str) -> Option<(&str, &str, bool)> {
    let mut quote: Option<char> = None;
    for (i, c) in body.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '=' | '!') if body[i + 1..].starts_with('=') => {
                return Some((&body[..i], &body[i + 2..], c == '!'));
            }
            _ => {}
        }
    }
    None
}

fn unquote(s: &str) -> Option<&str> {
    let s = s.trim();
    s.strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| s.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
}

fn parse_bracket(inner: &str) -> std::result::Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    if let Some(key) = unquote(inner) {
        return Ok(Segment::Field(key.to_string()));
    }
    if let Some(filter) = inner.strip_prefix('?') {
        return parse_filter(filter.trim());
    }
    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| format!("unsupported subscript [{}]", inner))
}

fn parse_filter(filter: &str) -> std::result::Result<Segment, String> {
    let body = filter
        .strip_prefix('(')
        .and_then(|f| f.strip_suffix(')'))
        .ok_or_else(|| "filters must be written as ?(...)".to_string())?;

    let (lhs, rhs, negate) = split_comparison(body)
        .ok_or_else(|| "filters must compare with == or !=".to_string())?;

    let path = lhs
        .trim()
        .strip_prefix("@.")
        .ok_or_else(|| "filter must start with @.".to_string())?;
    let path: Vec<String> = path.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err("empty field in filter".to_string());
    }

    let rhs = rhs.trim();
    let value = unquote(rhs).unwrap_or(rhs).to_string();

    Ok(Segment::Filter {
        path,
        negate,
        value,
    })
}
