//! Runtime values and the coercions between text, numbers and booleans

use std::fmt;

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl Value {
    /// Numeric view: numbers, and text that reads as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => parse_number(s),
            Value::Bool(_) | Value::Null => None,
        }
    }

    /// Boolean view: booleans, non-zero numbers, `true`/`false` text
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            Value::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "истина" => Some(true),
                "false" | "ложь" => Some(false),
                _ => None,
            },
            Value::Null => None,
        }
    }

    /// Plain text of the value, as used for string operations
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Null => String::new(),
        }
    }

    /// Text written back into a cell after evaluation.
    ///
    /// Null and blank results become the empty-string literal `''`.
    pub fn render(&self) -> String {
        match self {
            Value::Text(s) if s.trim().is_empty() => EMPTY_LITERAL.to_string(),
            Value::Null => EMPTY_LITERAL.to_string(),
            other => other.to_text(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// The two-character empty-string literal
pub const EMPTY_LITERAL: &str = "''";

/// Format a number rounded to 3 decimals with a `.` separator and no
/// trailing zeros
pub fn format_number(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        // avoids "-0"
        return "0".to_string();
    }
    format!("{}", rounded)
}

/// Parse text as a finite number, accepting only a `.` decimal separator
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether text reads as a number
pub fn is_numeric(text: &str) -> bool {
    parse_number(text).is_some()
}

/// Split a `lo-hi` range at the first `-` that follows a digit, so bounds
/// may be negative (`-5-5`, `-10--1`)
pub fn split_range(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    let mut prev_digit = false;
    for (i, c) in text.char_indices() {
        if c == '-' && prev_digit {
            return Some((&text[..i], &text[i + 1..]));
        }
        prev_digit = c.is_ascii_digit();
    }
    None
}
