//! Parser facade: formula text to terms, plus token information for editors

use crate::ast::{AstKind, AstNode};
use crate::context::ParserContext;
use crate::error::ParserResult;
use crate::term::Term;
use crate::tokenizer::{create_ast, create_ast_with};
use crate::transformer::create_term;
use crate::value::Value;

/// Kind of a [`TokenInfo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Operator,
    Function,
    List,
    Condition,
    /// Missing expression, only reported when invalid
    Undef,
}

/// A highlighted span of formula text
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenInfo {
    pub kind: TokenKind,
    pub text: String,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset after the last character
    pub end: usize,
    pub invalid: bool,
    /// Nesting level: 0 at top level, +1 inside each call, list, condition or group
    pub depth: usize,
}

/// Entry point for parsing formulas
pub struct Parser;

impl Parser {
    /// Parse a formula into a term tree. A leading `=` is ignored.
    ///
    /// # Example
    /// ```rust
    /// use streamsheets_parser::{DefaultParserContext, Parser, Value};
    ///
    /// let context = DefaultParserContext::new();
    /// let term = Parser::parse("=2+2*2", &context).unwrap();
    /// assert_eq!(term.value(), Value::Number(6.0));
    /// assert_eq!(term.to_string(), "2+2*2");
    /// ```
    pub fn parse(formula: &str, context: &dyn ParserContext) -> ParserResult<Term> {
        let ast = Self::parse_ast(formula, context)?;
        let term = create_term(&ast, context, None)?;
        log::debug!("parsed '{}' into '{}'", formula.trim(), term);
        Ok(term)
    }

    /// Parse a formula into its untyped AST. Spans refer to `formula` as given.
    pub fn parse_ast(formula: &str, context: &dyn ParserContext) -> ParserResult<AstNode> {
        create_ast(&blank_equals(formula), context)
    }

    /// Leaf term holding a plain value, for cells without a formula.
    /// Lists become list terms of leaves.
    pub fn parse_value_term(value: Value) -> Term {
        match value {
            Value::List(items) => Term::list(items.into_iter().map(Self::parse_value_term).collect()),
            value => Term::value_term(value),
        }
    }

    /// Tokens of a possibly incomplete formula, sorted by position.
    ///
    /// Always parses in tolerant mode, so this never fails on malformed
    /// input; malformed parts come back flagged `invalid`.
    pub fn token_infos(formula: &str, context: &dyn ParserContext) -> Vec<TokenInfo> {
        let text = blank_equals(formula);
        let settings = context.settings().ignore_errors(true);
        let ast = match create_ast_with(&text, context, settings) {
            Ok(ast) => ast,
            Err(err) => {
                log::warn!("tolerant tokenization failed: {err}");
                return Vec::new();
            }
        };

        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        collect_tokens(&ast, &chars, 0, &mut tokens);
        tokens.sort_by_key(|token| (token.start, token.end));
        tokens
    }

    /// Innermost token covering the character at `index`.
    pub fn token_at(formula: &str, index: usize, context: &dyn ParserContext) -> Option<TokenInfo> {
        Self::token_infos(formula, context)
            .into_iter()
            .filter(|token| token.start <= index && index < token.end)
            .max_by_key(|token| token.depth)
    }
}

/// Replace a leading `=` by a blank, keeping character offsets intact.
fn blank_equals(formula: &str) -> String {
    let trimmed = formula.trim_start();
    let mut text = formula.to_string();
    if trimmed.starts_with('=') {
        let offset = formula.len() - trimmed.len();
        text.replace_range(offset..offset + 1, " ");
    }
    text
}

fn collect_tokens(node: &AstNode, chars: &[char], depth: usize, tokens: &mut Vec<TokenInfo>) {
    let mut push = |kind: TokenKind, start: usize, end: usize, invalid: bool| {
        let end = end.min(chars.len());
        let start = start.min(end);
        tokens.push(TokenInfo {
            kind,
            text: chars[start..end].iter().collect(),
            start,
            end,
            invalid,
            depth,
        });
    };
    let inner = if node.use_brackets { depth + 1 } else { depth };

    match &node.kind {
        AstKind::Number { .. } => push(TokenKind::Number, node.start, node.end, node.invalid),
        AstKind::String { .. } => push(TokenKind::String, node.start, node.end, node.invalid),
        AstKind::Identifier { .. } => push(TokenKind::Identifier, node.start, node.end, node.invalid),
        AstKind::Undef => {
            if node.invalid {
                push(TokenKind::Undef, node.start, node.end, true);
            }
        }
        AstKind::UnaryOp {
            operator,
            operand,
            postfix,
        } => {
            let width = operator.chars().count();
            if *postfix {
                push(TokenKind::Operator, node.end - width, node.end, node.invalid);
            } else {
                // a group starts at its opening bracket
                let start = if node.use_brackets { node.start + 1 } else { node.start };
                push(TokenKind::Operator, start, start + width, node.invalid);
            }
            collect_tokens(operand, chars, inner, tokens);
        }
        AstKind::BinaryOp {
            operator,
            left,
            right,
        } => {
            let symbol: Vec<char> = operator.chars().collect();
            let between = left.end..right.start.max(left.end);
            let found = chars
                .get(between.clone())
                .and_then(|gap| gap.windows(symbol.len()).position(|window| window == symbol.as_slice()));
            if let Some(offset) = found {
                let start = between.start + offset;
                push(TokenKind::Operator, start, start + symbol.len(), node.invalid);
            }
            collect_tokens(left, chars, inner, tokens);
            collect_tokens(right, chars, inner, tokens);
        }
        AstKind::Function { name, params } => {
            let start = if node.use_brackets { node.start + 1 } else { node.start };
            push(TokenKind::Function, start, start + name.chars().count(), node.invalid);
            for param in params {
                collect_tokens(param, chars, inner + 1, tokens);
            }
        }
        AstKind::List { params } | AstKind::Condition { params } => {
            let kind = if matches!(node.kind, AstKind::List { .. }) {
                TokenKind::List
            } else {
                TokenKind::Condition
            };
            let start = if node.use_brackets { node.start + 1 } else { node.start };
            push(kind, start, start + 1, node.invalid);
            for param in params {
                collect_tokens(param, chars, inner + 1, tokens);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DefaultParserContext;
    use crate::error::ErrorCode;
    use crate::function::formula_fn;
    use pretty_assertions::assert_eq;

    fn context() -> DefaultParserContext {
        let mut context = DefaultParserContext::new();
        context.set_function("SUM", formula_fn(|_, params| {
            Value::Number(params.iter().map(|p| p.value().to_number()).sum())
        }));
        context
    }

    #[test]
    fn test_parse_strips_equals() {
        let context = context();
        let term = Parser::parse("  =SUM(1, 2, 3)", &context).unwrap();
        assert_eq!(term.value(), Value::Number(6.0));
        assert_eq!(term.to_string(), "SUM(1,2,3)");
    }

    #[test]
    fn test_parse_errors_keep_positions() {
        let err = Parser::parse("=SUM(1,", &context()).unwrap_err();
        assert_eq!(err.code, ErrorCode::EXPECTED_BRACKET_RIGHT);
        assert_eq!(err.index, 7);
        assert_eq!(err.name, "ParserError");
    }

    #[test]
    fn test_parse_value_term() {
        let term = Parser::parse_value_term(Value::List(vec![Value::Number(1.0), Value::from("a")]));
        assert_eq!(term.to_string(), "[1,\"a\"]");
        assert!(Parser::parse_value_term(Value::Number(5.0)).is_static());
    }

    #[test]
    fn test_token_infos() {
        let tokens = Parser::token_infos("=SUM(A1, 2) * \"x\"", &context());
        let summary: Vec<(TokenKind, &str, usize)> = tokens
            .iter()
            .map(|t| (t.kind, t.text.as_str(), t.depth))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Function, "SUM", 0),
                (TokenKind::Identifier, "A1", 1),
                (TokenKind::Number, "2", 1),
                (TokenKind::Operator, "*", 0),
                (TokenKind::String, "\"x\"", 0),
            ]
        );
        assert_eq!((tokens[1].start, tokens[1].end), (5, 7));
    }

    #[test]
    fn test_token_infos_are_tolerant() {
        let tokens = Parser::token_infos("SUM(1, \"open", &context());
        assert!(tokens.iter().any(|t| t.invalid));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::String));
    }

    #[test]
    fn test_token_at() {
        let context = context();
        let token = Parser::token_at("=1 + foo", 6, &context).unwrap();
        assert_eq!(token.kind, TokenKind::Identifier);
        assert_eq!(token.text, "foo");
        assert_eq!(Parser::token_at("=1 + foo", 3, &context).map(|t| t.kind), Some(TokenKind::Operator));
        assert!(Parser::token_at("=1 + foo", 2, &context).is_none());
    }
}
