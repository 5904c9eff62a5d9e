//! Runtime values produced by term evaluation

use std::fmt;
use std::rc::Rc;

/// Value types during term evaluation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value (unset cell, empty parameter, unresolved reference)
    #[default]
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    /// Result of a list literal or a function returning several values
    List(Vec<Value>),
    /// Application-level error sentinel, e.g. `#NA`. Never interpreted here.
    Error(String),
    /// Structured payload returned by functions (messages, JSON objects)
    Object(Rc<serde_json::Value>),
}

impl Value {
    /// Create an error sentinel
    pub fn error(code: impl Into<String>) -> Self {
        Value::Error(code.into())
    }

    /// Undefined values take part in null propagation of binary operators.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Lists and objects have no scalar representation.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::List(_) | Value::Object(_))
    }

    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(true) => Some(1.0),
            Value::Bool(false) => Some(0.0),
            Value::String(s) if s.trim().is_empty() => Some(0.0),
            Value::String(s) => s.trim().parse().ok(),
            Value::Undefined => Some(0.0),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic; non-numeric values become NaN.
    pub fn to_number(&self) -> f64 {
        self.as_number().unwrap_or(f64::NAN)
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0 && !n.is_nan()),
            Value::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            }
            Value::Undefined => Some(false),
            _ => None,
        }
    }

    /// Truthiness used by conditions: anything non-empty and non-zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(s) => self.as_bool().unwrap_or(!s.is_empty()),
            Value::List(_) | Value::Object(_) => true,
            Value::Error(_) => false,
            _ => self.as_bool().unwrap_or(false),
        }
    }

    /// Convert to text, as used by concatenation
    pub fn as_text(&self) -> String {
        match self {
            Value::Undefined => String::new(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::as_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Error(e) => e.clone(),
            Value::Object(obj) => obj.to_string(),
        }
    }

    /// Name of the value type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Error(_) => "error",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Format a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Undefined,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or_default(),
            serde_json::Value::String(s) => Value::String(s),
            other => Value::Object(Rc::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::Bool(true).as_number(), Some(1.0));
        assert_eq!(Value::from(" 2.5 ").as_number(), Some(2.5));
        assert_eq!(Value::Undefined.as_number(), Some(0.0));
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::error("#NA").as_number(), None);
    }

    #[test]
    fn test_text_conversion() {
        assert_eq!(Value::Number(42.0).as_text(), "42");
        assert_eq!(Value::Number(0.25).as_text(), "0.25");
        assert_eq!(Value::Bool(false).as_text(), "FALSE");
        assert_eq!(
            Value::List(vec![Value::Number(1.0), Value::from("a")]).as_text(),
            "1,a"
        );
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(3.0).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from("false").is_truthy());
        assert!(!Value::Undefined.is_truthy());
    }

    #[test]
    fn test_json_conversion() {
        let value: Value = serde_json::json!({"a": 1}).into();
        assert!(value.is_object());
        let value: Value = serde_json::json!(3).into();
        assert_eq!(value, Value::Number(3.0));
    }
}
