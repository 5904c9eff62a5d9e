//! AST to term transformation

use crate::ast::{AstKind, AstNode};
use crate::context::ParserContext;
use crate::error::{ErrorCode, ParserError, ParserResult};
use crate::operand::{Operand, StringOperand};
use crate::term::{FuncTerm, Term};

/// Transform `node` into a term tree.
///
/// The context gets the first refusal on every node through
/// [`ParserContext::create_reference_term`], and binds function nodes through
/// [`ParserContext::create_function_term`]. In tolerant mode the strictness
/// checks mark terms invalid instead of failing.
pub fn create_term(
    node: &AstNode,
    context: &dyn ParserContext,
    parent: Option<&AstNode>,
) -> ParserResult<Term> {
    let mut term = match context.create_reference_term(node, parent)? {
        Some(term) => term,
        None => transform(node, context, parent)?,
    };
    if node.invalid {
        term.set_invalid(true);
    }
    if node.use_brackets {
        term.set_use_brackets(true);
    }
    log::trace!("transformed {} node at {} into '{}'", node.type_name(), node.start, term);
    Ok(term)
}

fn transform(
    node: &AstNode,
    context: &dyn ParserContext,
    parent: Option<&AstNode>,
) -> ParserResult<Term> {
    let child = |child: &AstNode| create_term(child, context, Some(node));
    let children = |params: &[AstNode]| params.iter().map(child).collect::<ParserResult<Vec<_>>>();

    let term = match &node.kind {
        AstKind::Number { value, .. } => Term::leaf(Operand::Number(*value)),
        AstKind::String { value } => {
            Term::leaf(Operand::String(StringOperand::from_source(value.as_str())))
        }
        AstKind::Identifier { name } => {
            if name.eq_ignore_ascii_case("true") {
                Term::leaf(Operand::Bool(true))
            } else if name.eq_ignore_ascii_case("false") {
                Term::leaf(Operand::Bool(false))
            } else {
                let mut term = Term::leaf(Operand::String(StringOperand::bare(name.as_str())));
                if context.strict() {
                    reject(
                        context,
                        format!("Unknown identifier '{name}'"),
                        node.start,
                        ErrorCode::UNKNOWN_IDENTIFIER,
                    )?;
                    term.set_invalid(true);
                }
                term
            }
        }
        AstKind::UnaryOp {
            operator,
            operand,
            postfix,
        } => {
            let symbol = operator.chars().next().unwrap_or_default();
            let operators = context.operators();
            let operand = child(operand)?;
            let resolved = if *postfix {
                operators.postfix(symbol).map(|op| Term::unit(op, operand))
            } else {
                operators.prefix(symbol).map(|op| Term::unary(op, operand))
            };
            match resolved {
                Some(term) => term,
                None => return Err(unknown_operator(operator, node)),
            }
        }
        AstKind::BinaryOp {
            operator,
            left,
            right,
        } => {
            let entry = context
                .operators()
                .infix(operator)
                .ok_or_else(|| unknown_operator(operator, node))?;
            let mut term = Term::binary(entry.operator, child(left)?, child(right)?);
            if context.strict() && (left.is_undef() || right.is_undef()) {
                let index = if left.is_undef() { left.start } else { right.start };
                reject(
                    context,
                    format!("Missing operand for '{operator}'"),
                    index,
                    ErrorCode::MISSING_OPERAND,
                )?;
                term.set_invalid(true);
            }
            term
        }
        AstKind::Condition { params } => match params.as_slice() {
            [condition, on_true, on_false] => {
                Term::condition(child(condition)?, child(on_true)?, child(on_false)?)
            }
            _ => {
                return Err(ParserError::new(
                    format!("Condition expects 3 parameters, found {}", params.len()),
                    node.start,
                    ErrorCode::EXPECTED_SEPARATOR,
                ))
            }
        },
        AstKind::List { params } => Term::list(children(params)?),
        AstKind::Function { name, params } => match context.create_function_term(node, parent)? {
            Some(term) => term,
            None => {
                let mut func = FuncTerm::new(name.as_str(), children(params)?);
                if let Some(function) = context.get_function(name) {
                    func = func.with_function(function);
                }
                if let Some(scope) = context.function_scope() {
                    func = func.with_scope(scope);
                }
                Term::function(func)
            }
        },
        AstKind::Undef => Term::null(),
    };
    Ok(term)
}

/// Strictness diagnostics are swallowed in tolerant mode.
fn reject(
    context: &dyn ParserContext,
    message: String,
    index: usize,
    code: ErrorCode,
) -> ParserResult<()> {
    let error = ParserError::new(message, index, code);
    if context.ignore_errors() {
        log::warn!("ignoring {error}");
        Ok(())
    } else {
        Err(error)
    }
}

fn unknown_operator(operator: &str, node: &AstNode) -> ParserError {
    ParserError::new(
        format!("Unknown operator '{operator}'"),
        node.start,
        ErrorCode::UNEXPECTED_CHAR,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DefaultParserContext;
    use crate::function::formula_fn;
    use crate::term::TermNode;
    use crate::tokenizer::create_ast;
    use crate::value::Value;

    fn term(formula: &str, context: &DefaultParserContext) -> ParserResult<Term> {
        create_term(&create_ast(formula, context)?, context, None)
    }

    #[test]
    fn test_literals() {
        let context = DefaultParserContext::new();
        assert_eq!(term("TRUE", &context).unwrap().value(), Value::Bool(true));
        assert_eq!(term("false", &context).unwrap().value(), Value::Bool(false));
        assert_eq!(
            term(r#""a\"b""#, &context).unwrap().value(),
            Value::String("a\"b".into())
        );
    }

    #[test]
    fn test_bare_identifiers() {
        let mut context = DefaultParserContext::new();
        let bare = term("total", &context).unwrap();
        assert_eq!(bare.value(), Value::String(String::new()));
        assert_eq!(bare.to_string(), "total");

        context.settings_mut().strict = true;
        let err = term("total", &context).unwrap_err();
        assert_eq!(err.code, ErrorCode::UNKNOWN_IDENTIFIER);
        assert_eq!(err.index, 0);

        context.settings_mut().ignore_errors = true;
        assert!(term("total", &context).unwrap().is_invalid());
    }

    #[test]
    fn test_missing_operand() {
        let mut context = DefaultParserContext::new();
        assert_eq!(term("1+", &context).unwrap().value(), Value::Number(1.0));

        context.settings_mut().strict = true;
        let err = term("1+", &context).unwrap_err();
        assert_eq!(err.code, ErrorCode::MISSING_OPERAND);
        assert_eq!(err.index, 2);
    }

    #[test]
    fn test_operator_terms() {
        let context = DefaultParserContext::new();
        let percent = term("50%", &context).unwrap();
        assert!(matches!(percent.node(), TermNode::Unit { .. }));
        assert_eq!(percent.value(), Value::Number(0.5));

        let alias = term("1==1", &context).unwrap();
        assert_eq!(alias.to_string(), "1=1");
        assert_eq!(alias.value(), Value::Bool(true));
    }

    #[test]
    fn test_functions_are_bound() {
        let mut context = DefaultParserContext::new();
        context.set_function("TWICE", formula_fn(|_, params| {
            Value::Number(params.first().map_or(0.0, |p| p.value().to_number()) * 2.0)
        }));
        let twice = term("twice(21)", &context).unwrap();
        assert!(twice.as_function().unwrap().is_bound());
        assert_eq!(twice.value(), Value::Number(42.0));
        assert_eq!(twice.to_string(), "twice(21)");
    }

    #[test]
    fn test_flags_are_copied() {
        let mut context = DefaultParserContext::new();
        context.settings_mut().ignore_errors = true;
        let group = term("(1+2)", &context).unwrap();
        assert!(group.use_brackets());
        assert_eq!(group.to_string(), "(1+2)");

        let broken = term("[1, 2", &context).unwrap();
        assert!(broken.is_invalid());
    }
}
