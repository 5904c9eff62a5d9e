//! Operands: the typed, immutable leaves of a term tree

use crate::cell::Cell;
use crate::locale::Separators;
use crate::value::{format_number, Value};
use std::fmt;
use std::rc::Rc;

/// Operand type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Bool,
    Number,
    String,
    Reference,
    Undef,
}

/// Kind of entity a [`Reference`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Cell,
    Range,
    Other,
}

/// Capability implemented by the sheet for cell and range references.
///
/// The parser core never resolves coordinates itself. It only asks a
/// reference for its current value and for the cells it points at, so that
/// reference-following traversals can continue into their terms.
///
/// Implementations should hold their target cells weakly: a cell owns its
/// term, the term owns its references, and a cyclic sheet would otherwise
/// never be freed.
pub trait Reference: fmt::Debug + fmt::Display {
    fn kind(&self) -> ReferenceKind;

    /// `false` while the referenced sheet position does not exist.
    fn is_resolved(&self) -> bool;

    /// Current value of the target, usually the target cell's cached value.
    fn value(&self) -> Value;

    /// The referenced cell, if any.
    fn target(&self) -> Option<Rc<Cell>>;

    /// All referenced cells. Range references override this.
    fn targets(&self) -> Vec<Rc<Cell>> {
        self.target().into_iter().collect()
    }

    /// Identity used by cycle detection.
    fn is_same(&self, other: &dyn Reference) -> bool {
        self.kind() == other.kind() && self.to_string() == other.to_string()
    }

    /// Reference text for the given separators.
    fn to_locale_string(&self, _separators: &Separators) -> String {
        self.to_string()
    }
}

/// String literal keeping both its escaped source and unescaped value.
///
/// A bare word accepted in non-strict mode is stored unquoted, with an empty
/// value and the word as its source.
#[derive(Debug, Clone)]
pub struct StringOperand {
    source: String,
    value: String,
    quoted: bool,
}

impl StringOperand {
    /// Build from escaped source text (without the surrounding quotes).
    pub fn from_source(source: impl Into<String>) -> Self {
        let source = source.into();
        let value = unescape(&source);
        Self {
            source,
            value,
            quoted: true,
        }
    }

    /// Build from a plain value, escaping backslashes and every character
    /// the tokenizer accepts as a closing quote.
    pub fn from_value(value: impl Into<String>) -> Self {
        let value = value.into();
        let mut source = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\\') {
                source.push('\\');
            }
            source.push(c);
        }
        Self {
            source,
            value,
            quoted: true,
        }
    }

    /// Unknown identifier tolerated in non-strict mode.
    pub fn bare(word: impl Into<String>) -> Self {
        Self {
            source: word.into(),
            value: String::new(),
            quoted: false,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_bare(&self) -> bool {
        !self.quoted
    }
}

impl PartialEq for StringOperand {
    fn eq(&self, other: &Self) -> bool {
        self.quoted == other.quoted
            && self.value == other.value
            && (self.quoted || self.source == other.source)
    }
}

impl fmt::Display for StringOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted {
            write!(f, "\"{}\"", self.source)
        } else {
            f.write_str(&self.source)
        }
    }
}

fn unescape(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Typed leaf value of a term
#[derive(Debug, Clone)]
pub enum Operand {
    Undef,
    Bool(bool),
    Number(f64),
    String(StringOperand),
    Reference(Rc<dyn Reference>),
}

impl Operand {
    /// Shared undefined operand
    pub const UNDEF: Operand = Operand::Undef;

    pub fn reference(reference: impl Reference + 'static) -> Self {
        Operand::Reference(Rc::new(reference))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Operand::String(StringOperand::from_value(value))
    }

    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Undef => OperandKind::Undef,
            Operand::Bool(_) => OperandKind::Bool,
            Operand::Number(_) => OperandKind::Number,
            Operand::String(_) => OperandKind::String,
            Operand::Reference(_) => OperandKind::Reference,
        }
    }

    /// Current value; references are asked on every call.
    pub fn value(&self) -> Value {
        match self {
            Operand::Undef => Value::Undefined,
            Operand::Bool(b) => Value::Bool(*b),
            Operand::Number(n) => Value::Number(*n),
            Operand::String(s) => Value::String(s.value().to_string()),
            Operand::Reference(r) => r.value(),
        }
    }

    pub fn as_reference(&self) -> Option<&Rc<dyn Reference>> {
        match self {
            Operand::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Operand::Reference(_))
    }

    /// Type and value equality; references compare by identity.
    pub fn is_equal_to(&self, other: &Operand) -> bool {
        match (self, other) {
            (Operand::Undef, Operand::Undef) => true,
            (Operand::Bool(a), Operand::Bool(b)) => a == b,
            (Operand::Number(a), Operand::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Operand::String(a), Operand::String(b)) => a == b,
            (Operand::Reference(a), Operand::Reference(b)) => a.is_same(b.as_ref()),
            _ => false,
        }
    }

    pub fn to_locale_string(&self, separators: &Separators) -> String {
        match self {
            Operand::Undef => String::new(),
            Operand::Bool(true) => "TRUE".to_string(),
            Operand::Bool(false) => "FALSE".to_string(),
            Operand::Number(n) => {
                let text = format_number(*n);
                if separators.decimal() == '.' {
                    text
                } else {
                    text.replace('.', &separators.decimal().to_string())
                }
            }
            Operand::String(s) => s.to_string(),
            Operand::Reference(r) => r.to_locale_string(separators),
        }
    }
}

impl PartialEq for Operand {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal_to(other)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_locale_string(&Separators::DEFAULT))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined => Operand::Undef,
            Value::Bool(b) => Operand::Bool(b),
            Value::Number(n) => Operand::Number(n),
            other => Operand::string(other.as_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_escaping() {
        let s = StringOperand::from_source(r#"say \"hi\" \\o/"#);
        assert_eq!(s.value(), r#"say "hi" \o/"#);
        assert_eq!(s.to_string(), r#""say \"hi\" \\o/""#);

        let s = StringOperand::from_value(r#"a"b"#);
        assert_eq!(s.source(), r#"a\"b"#);
        assert_eq!(s, StringOperand::from_source(r#"a\"b"#));

        let s = StringOperand::from_value("say \u{201C}hi\u{201D}");
        assert_eq!(s.source(), "say \\\u{201C}hi\\\u{201D}");
        assert_eq!(s.value(), "say \u{201C}hi\u{201D}");
    }

    #[test]
    fn test_bare_word() {
        let s = StringOperand::bare("speed");
        assert!(s.is_bare());
        assert_eq!(s.value(), "");
        assert_eq!(s.to_string(), "speed");
        assert_ne!(s, StringOperand::bare("other"));
    }

    #[test]
    fn test_operand_equality() {
        assert_eq!(Operand::Number(2.0), Operand::Number(2.0));
        assert_ne!(Operand::Number(1.0), Operand::Bool(true));
        assert_eq!(Operand::UNDEF, Operand::Undef);
        assert_eq!(Operand::UNDEF.value(), Value::Undefined);
    }

    #[test]
    fn test_locale_number_text() {
        let de = Separators::for_locale("de");
        assert_eq!(Operand::Number(2.4).to_locale_string(&de), "2,4");
        assert_eq!(Operand::Number(2.4).to_string(), "2.4");
        assert_eq!(Operand::Bool(true).to_string(), "TRUE");
    }
}
