//! Operators and the operator table
//!
//! Operators are pure functions over the values of their operand terms.
//! Binary and bool operators carry a precedence, which lives in the
//! [`OperatorTable`] owned by a parser context rather than in the operator
//! itself, so two contexts may rank the same symbol differently.

use crate::term::Term;
use crate::value::Value;
use ahash::AHashMap;
use std::cmp::Ordering;
use std::fmt;

/// Prefix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "!",
        }
    }

    pub fn calc(self, operand: &Term) -> Value {
        let value = operand.value();
        if value.is_error() {
            return value;
        }
        match self {
            UnaryOperator::Negate => Value::Number(-value.to_number()),
            UnaryOperator::Plus => Value::Number(value.to_number()),
            UnaryOperator::Not => Value::Bool(!value.is_truthy()),
        }
    }
}

/// Postfix operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitOperator {
    Percent,
}

impl UnitOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnitOperator::Percent => "%",
        }
    }

    pub fn calc(self, operand: &Term) -> Value {
        let value = operand.value();
        if value.is_error() {
            return value;
        }
        match self {
            UnitOperator::Percent => Value::Number(value.to_number() / 100.0),
        }
    }
}

/// Arithmetic and text operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Concat,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Concat => "&",
        }
    }

    /// Apply the operator.
    ///
    /// Errors propagate unchanged, left side first. `+` and `*` follow the
    /// null rule: if exactly one side is undefined the other side is returned,
    /// and two undefined sides give undefined. `-`, `/` and `^` read an
    /// undefined side as `0`; `&` reads it as the empty string.
    pub fn calc(self, left: &Term, right: &Term) -> Value {
        let lhs = left.value();
        if lhs.is_error() {
            return lhs;
        }
        let rhs = right.value();
        if rhs.is_error() {
            return rhs;
        }

        match self {
            BinaryOperator::Add | BinaryOperator::Multiply => {
                match (lhs.is_nullish(), rhs.is_nullish()) {
                    (true, true) => Value::Undefined,
                    (true, false) => rhs,
                    (false, true) => lhs,
                    (false, false) => {
                        let (l, r) = (lhs.to_number(), rhs.to_number());
                        if self == BinaryOperator::Add {
                            Value::Number(l + r)
                        } else {
                            Value::Number(l * r)
                        }
                    }
                }
            }
            BinaryOperator::Subtract => Value::Number(lhs.to_number() - rhs.to_number()),
            BinaryOperator::Divide => Value::Number(lhs.to_number() / rhs.to_number()),
            BinaryOperator::Power => Value::Number(lhs.to_number().powf(rhs.to_number())),
            BinaryOperator::Concat => Value::String(lhs.as_text() + &rhs.as_text()),
        }
    }
}

/// Comparison and logic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOperator {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BoolOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BoolOperator::Equal => "=",
            BoolOperator::NotEqual => "<>",
            BoolOperator::Less => "<",
            BoolOperator::LessEqual => "<=",
            BoolOperator::Greater => ">",
            BoolOperator::GreaterEqual => ">=",
            BoolOperator::And => "&&",
            BoolOperator::Or => "||",
        }
    }

    /// Apply the operator. An unresolved reference on either side yields
    /// `false` instead of an error or a comparison against nothing.
    pub fn calc(self, left: &Term, right: &Term) -> Value {
        if left.is_unresolved_reference() || right.is_unresolved_reference() {
            return Value::Bool(false);
        }
        let lhs = left.value();
        if lhs.is_error() {
            return lhs;
        }
        let rhs = right.value();
        if rhs.is_error() {
            return rhs;
        }

        let result = match self {
            BoolOperator::Equal => values_equal(&lhs, &rhs),
            BoolOperator::NotEqual => !values_equal(&lhs, &rhs),
            BoolOperator::Less => compare(&lhs, &rhs) == Some(Ordering::Less),
            BoolOperator::LessEqual => matches!(
                compare(&lhs, &rhs),
                Some(Ordering::Less | Ordering::Equal)
            ),
            BoolOperator::Greater => compare(&lhs, &rhs) == Some(Ordering::Greater),
            BoolOperator::GreaterEqual => matches!(
                compare(&lhs, &rhs),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            BoolOperator::And => lhs.is_truthy() && rhs.is_truthy(),
            BoolOperator::Or => lhs.is_truthy() || rhs.is_truthy(),
        };
        Value::Bool(result)
    }
}

/// Loose equality: numbers compare numerically, text exactly, undefined
/// matches `0`, `""` and `false`.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => l == r,
        (Value::Undefined, Value::String(s)) | (Value::String(s), Value::Undefined) => s.is_empty(),
        (Value::List(l), Value::List(r)) => l == r,
        (Value::Object(l), Value::Object(r)) => l == r,
        _ => compare(lhs, rhs) == Some(Ordering::Equal),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::String(_), _) | (_, Value::String(_)) => {
            match (lhs.as_number(), rhs.as_number()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => Some(lhs.as_text().cmp(&rhs.as_text())),
            }
        }
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => None,
        },
    }
}

/// Ternary `?(condition, onTrue, onFalse)`; only the taken branch is evaluated.
pub fn calc_condition(condition: &Term, on_true: &Term, on_false: &Term) -> Value {
    let test = condition.value();
    if test.is_error() {
        return test;
    }
    if test.is_truthy() {
        on_true.value()
    } else {
        on_false.value()
    }
}

/// Any operator a term can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Unary(UnaryOperator),
    Unit(UnitOperator),
    Binary(BinaryOperator),
    Bool(BoolOperator),
    Condition,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Unary(op) => op.symbol(),
            Operator::Unit(op) => op.symbol(),
            Operator::Binary(op) => op.symbol(),
            Operator::Bool(op) => op.symbol(),
            Operator::Condition => "?",
        }
    }

    /// Operators that combine two operand terms
    pub fn is_infix(self) -> bool {
        matches!(self, Operator::Binary(_) | Operator::Bool(_))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Registered infix operator with its precedence (higher binds tighter)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfixEntry {
    pub operator: Operator,
    pub precedence: u8,
}

/// Registry of operator symbols known to the tokenizer.
#[derive(Debug, Clone)]
pub struct OperatorTable {
    infix: AHashMap<String, InfixEntry>,
    prefix: AHashMap<char, UnaryOperator>,
    postfix: AHashMap<char, UnitOperator>,
}

impl OperatorTable {
    /// An empty table, without any operator
    pub fn empty() -> Self {
        Self {
            infix: AHashMap::new(),
            prefix: AHashMap::new(),
            postfix: AHashMap::new(),
        }
    }

    /// Register (or re-rank) an infix symbol. Symbols are one or two characters.
    pub fn register_infix(&mut self, symbol: &str, operator: Operator, precedence: u8) {
        debug_assert!(operator.is_infix());
        debug_assert!((1..=2).contains(&symbol.chars().count()));
        self.infix.insert(
            symbol.to_string(),
            InfixEntry {
                operator,
                precedence,
            },
        );
    }

    pub fn register_prefix(&mut self, symbol: char, operator: UnaryOperator) {
        self.prefix.insert(symbol, operator);
    }

    pub fn register_postfix(&mut self, symbol: char, operator: UnitOperator) {
        self.postfix.insert(symbol, operator);
    }

    pub fn infix(&self, symbol: &str) -> Option<InfixEntry> {
        self.infix.get(symbol).copied()
    }

    pub fn prefix(&self, symbol: char) -> Option<UnaryOperator> {
        self.prefix.get(&symbol).copied()
    }

    pub fn postfix(&self, symbol: char) -> Option<UnitOperator> {
        self.postfix.get(&symbol).copied()
    }

    /// Precedence of an infix operator, by its canonical symbol or an alias.
    pub fn precedence_of(&self, operator: Operator) -> Option<u8> {
        self.infix
            .values()
            .find(|entry| entry.operator == operator)
            .map(|entry| entry.precedence)
    }

    /// True if some infix symbol starts with `c`.
    pub fn starts_infix(&self, c: char) -> bool {
        self.infix.keys().any(|symbol| symbol.starts_with(c))
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = Self::empty();

        table.register_infix("||", Operator::Bool(BoolOperator::Or), 1);
        table.register_infix("&&", Operator::Bool(BoolOperator::And), 2);
        for (symbol, op) in [
            ("=", BoolOperator::Equal),
            ("==", BoolOperator::Equal),
            ("<>", BoolOperator::NotEqual),
            ("!=", BoolOperator::NotEqual),
            ("<", BoolOperator::Less),
            ("<=", BoolOperator::LessEqual),
            (">", BoolOperator::Greater),
            (">=", BoolOperator::GreaterEqual),
        ] {
            table.register_infix(symbol, Operator::Bool(op), 3);
        }
        table.register_infix("&", Operator::Binary(BinaryOperator::Concat), 4);
        table.register_infix("+", Operator::Binary(BinaryOperator::Add), 5);
        table.register_infix("-", Operator::Binary(BinaryOperator::Subtract), 5);
        table.register_infix("*", Operator::Binary(BinaryOperator::Multiply), 6);
        table.register_infix("/", Operator::Binary(BinaryOperator::Divide), 6);
        table.register_infix("^", Operator::Binary(BinaryOperator::Power), 7);

        table.register_prefix('-', UnaryOperator::Negate);
        table.register_prefix('+', UnaryOperator::Plus);
        table.register_prefix('!', UnaryOperator::Not);

        table.register_postfix('%', UnitOperator::Percent);

        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::formula_fn;
    use crate::operand::Operand;
    use crate::term::FuncTerm;

    fn num(n: f64) -> Term {
        Term::leaf(Operand::Number(n))
    }

    #[test]
    fn test_default_table() {
        let table = OperatorTable::default();
        assert_eq!(
            table.infix("==").map(|e| e.operator),
            Some(Operator::Bool(BoolOperator::Equal))
        );
        assert!(table.infix("*").unwrap().precedence > table.infix("+").unwrap().precedence);
        assert!(table.starts_infix('<'));
        assert!(!table.starts_infix('%'));
        assert_eq!(table.postfix('%'), Some(UnitOperator::Percent));
        assert_eq!(
            table.precedence_of(Operator::Binary(BinaryOperator::Power)),
            Some(7)
        );
    }

    #[test]
    fn test_null_propagation() {
        let undef = Term::leaf(Operand::Undef);
        assert_eq!(
            BinaryOperator::Add.calc(&undef, &num(3.0)),
            Value::Number(3.0)
        );
        assert_eq!(
            BinaryOperator::Multiply.calc(&num(4.0), &undef),
            Value::Number(4.0)
        );
        assert_eq!(BinaryOperator::Add.calc(&undef, &undef), Value::Undefined);
        assert_eq!(
            BinaryOperator::Subtract.calc(&undef, &num(3.0)),
            Value::Number(-3.0)
        );
    }

    #[test]
    fn test_error_propagation() {
        let sentinel = Term::function(
            FuncTerm::new("NA", Vec::new()).with_function(formula_fn(|_, _| Value::error("#NA"))),
        );
        assert_eq!(
            BinaryOperator::Add.calc(&sentinel, &num(1.0)),
            Value::error("#NA")
        );
        assert_eq!(UnaryOperator::Negate.calc(&sentinel), Value::error("#NA"));
        assert_eq!(
            BoolOperator::Equal.calc(&num(1.0), &sentinel),
            Value::error("#NA")
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            BoolOperator::GreaterEqual.calc(&num(4.0), &num(2.0)),
            Value::Bool(true)
        );
        assert_eq!(
            BoolOperator::Equal.calc(&num(4.0), &num(2.0)),
            Value::Bool(false)
        );
        let text = Term::leaf(Operand::string("4"));
        assert_eq!(BoolOperator::Equal.calc(&text, &num(4.0)), Value::Bool(true));
        assert_eq!(
            BoolOperator::Less.calc(&Term::leaf(Operand::string("a")), &Term::leaf(Operand::string("b"))),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_concat_and_percent() {
        assert_eq!(
            BinaryOperator::Concat.calc(&Term::leaf(Operand::string("v")), &num(2.0)),
            Value::String("v2".into())
        );
        assert_eq!(UnitOperator::Percent.calc(&num(50.0)), Value::Number(0.5));
    }
}
