//! Demonstration functions registered by the command-line tool

use streamsheets_parser::{formula_fn, FunctionTable, Term, Value};

/// Table with the demo functions
pub fn demo_functions() -> FunctionTable {
    let mut table = FunctionTable::new();
    table.set("SUM", formula_fn(|_, params| Value::Number(numbers(params).iter().sum())));
    table.set("MIN", formula_fn(|_, params| fold(params, f64::min)));
    table.set("MAX", formula_fn(|_, params| fold(params, f64::max)));
    table.set(
        "AVERAGE",
        formula_fn(|_, params| {
            let values = numbers(params);
            if values.is_empty() {
                return Value::error("#DIV/0");
            }
            Value::Number(values.iter().sum::<f64>() / values.len() as f64)
        }),
    );
    table.set(
        "LEN",
        formula_fn(|_, params| match params {
            [text] => error_or(text.value(), |value| {
                Value::Number(value.as_text().chars().count() as f64)
            }),
            _ => Value::error("#ARGS"),
        }),
    );
    table.set(
        "UPPER",
        formula_fn(|_, params| match params {
            [text] => error_or(text.value(), |value| {
                Value::String(value.as_text().to_uppercase())
            }),
            _ => Value::error("#ARGS"),
        }),
    );
    table.set(
        "CONCAT",
        formula_fn(|_, params| {
            let mut out = String::new();
            for param in params {
                let value = param.value();
                if value.is_error() {
                    return value;
                }
                out.push_str(&value.as_text());
            }
            Value::String(out)
        }),
    );
    // counts its own evaluations, kept in the call site's term context
    table.set(
        "COUNTER",
        formula_fn(|call, params| {
            let step = params.first().map_or(1.0, |p| p.value().as_number().unwrap_or(1.0));
            match call.term_context() {
                Some(context) => Value::Number(context.with_state_or_insert(
                    || 0.0,
                    |count: &mut f64| {
                        *count += step;
                        *count
                    },
                )),
                None => Value::Undefined,
            }
        }),
    );
    table
}

fn error_or(value: Value, f: impl FnOnce(&Value) -> Value) -> Value {
    if value.is_error() {
        value
    } else {
        f(&value)
    }
}

/// Numeric parameter values; lists (ranges) are flattened, text is skipped.
fn numbers(params: &[Term]) -> Vec<f64> {
    fn collect(value: &Value, out: &mut Vec<f64>) {
        match value {
            Value::List(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Number(n) => out.push(*n),
            Value::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
            _ => {}
        }
    }
    let mut out = Vec::new();
    for param in params {
        collect(&param.value(), &mut out);
    }
    out
}

fn fold(params: &[Term], f: fn(f64, f64) -> f64) -> Value {
    numbers(params)
        .into_iter()
        .reduce(f)
        .map(Value::Number)
        .unwrap_or(Value::Number(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamsheets_parser::{DefaultParserContext, Parser};

    fn eval(formula: &str) -> Value {
        let context = DefaultParserContext::new().with_functions(&demo_functions());
        Parser::parse(formula, &context).unwrap().value()
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(eval("SUM(1, [2, 3], \"x\")"), Value::Number(6.0));
        assert_eq!(eval("MIN(4, 2, 8)"), Value::Number(2.0));
        assert_eq!(eval("MAX(4, 2, 8)"), Value::Number(8.0));
        assert_eq!(eval("AVERAGE(1, 2, 3)"), Value::Number(2.0));
        assert_eq!(eval("AVERAGE()"), Value::error("#DIV/0"));
    }

    #[test]
    fn test_text_functions() {
        assert_eq!(eval("LEN(\"abc\")"), Value::Number(3.0));
        assert_eq!(eval("UPPER(\"abc\")"), Value::from("ABC"));
        assert_eq!(eval("CONCAT(\"a\", 1, TRUE)"), Value::from("a1TRUE"));
    }

    #[test]
    fn test_counter_keeps_state_per_term() {
        let context = DefaultParserContext::new().with_functions(&demo_functions());
        let term = Parser::parse("COUNTER(2)", &context).unwrap();
        assert_eq!(term.value(), Value::Number(2.0));
        assert_eq!(term.value(), Value::Number(4.0));
        let other = Parser::parse("COUNTER()", &context).unwrap();
        assert_eq!(other.value(), Value::Number(1.0));
    }
}
