//! Formula tokenizer
//!
//! A single forward scan over the formula characters that builds the AST
//! directly. Operands are dispatched on their first character; infix
//! operators are combined by precedence climbing over an explicit operator
//! stack, which yields left-associative trees.
//!
//! Every diagnostic goes through [`Tokenizer::fail`]. In tolerant mode the
//! diagnostic is logged and swallowed, and the caller marks the affected node
//! invalid so the scan can run on to the end of the input.

use crate::ast::{AstKind, AstNode};
use crate::context::{ContextSettings, ParserContext};
use crate::error::{ErrorCode, ParserError, ParserResult};

/// Build the AST for `formula` using the settings of `context`.
pub fn create_ast(formula: &str, context: &dyn ParserContext) -> ParserResult<AstNode> {
    create_ast_with(formula, context, *context.settings())
}

/// Build the AST with explicit settings, e.g. to force tolerant mode for
/// editor input regardless of the context's own mode.
pub fn create_ast_with(
    formula: &str,
    context: &dyn ParserContext,
    settings: ContextSettings,
) -> ParserResult<AstNode> {
    Tokenizer::new(formula, context, settings).parse()
}

const QUOTES: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

fn is_quote(c: char) -> bool {
    QUOTES.contains(&c)
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

struct Tokenizer<'a> {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
    context: &'a dyn ParserContext,
    settings: ContextSettings,
}

impl<'a> Tokenizer<'a> {
    fn new(formula: &str, context: &'a dyn ParserContext, settings: ContextSettings) -> Self {
        Self {
            chars: formula.chars().collect(),
            pos: 0,
            depth: 0,
            context,
            settings,
        }
    }

    fn parse(mut self) -> ParserResult<AstNode> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Ok(AstNode::undef(self.pos));
        }

        let mut root = self.parse_expression()?;

        self.skip_whitespace();
        if let Some(c) = self.peek() {
            self.fail(format!("Unexpected character '{c}'"), self.pos, ErrorCode::UNEXPECTED_CHAR)?;
            root.invalid = true;
        }
        log::debug!(
            "tokenized {} chars into {} node (invalid: {})",
            self.chars.len(),
            root.type_name(),
            root.has_invalid()
        );
        Ok(root)
    }

    /// Report a diagnostic. Returns `Ok` only in tolerant mode.
    fn fail(&self, message: impl Into<String>, index: usize, code: ErrorCode) -> ParserResult<()> {
        let error = ParserError::new(message, index, code);
        if self.settings.ignore_errors {
            log::warn!("ignoring {error}");
            Ok(())
        } else {
            Err(error)
        }
    }

    // === Cursor ===

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.chars.len() {
            self.pos += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.advance();
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn is_terminator(&self, c: char) -> bool {
        c == ')' || c == ']' || c == self.settings.separators.parameter()
    }

    // === Expressions ===

    fn parse_expression(&mut self) -> ParserResult<AstNode> {
        let mut operands = vec![self.parse_operand()?];
        let mut operators: Vec<(String, u8)> = Vec::new();

        while let Some((symbol, precedence)) = self.scan_infix() {
            while operators.last().map_or(false, |(_, top)| *top >= precedence) {
                self.reduce(&mut operands, &mut operators)?;
            }
            operators.push((symbol, precedence));
            operands.push(self.parse_operand()?);
        }
        while !operators.is_empty() {
            self.reduce(&mut operands, &mut operators)?;
        }
        Ok(operands.pop().unwrap_or_else(|| AstNode::undef(self.pos)))
    }

    /// Consume an infix operator if one starts at the cursor, preferring
    /// two-character symbols.
    fn scan_infix(&mut self) -> Option<(String, u8)> {
        self.skip_whitespace();
        let context = self.context;
        let operators = context.operators();
        let first = self.peek()?;
        if let Some(second) = self.peek_at(1) {
            let symbol: String = [first, second].iter().collect();
            if let Some(entry) = operators.infix(&symbol) {
                self.pos += 2;
                return Some((symbol, entry.precedence));
            }
        }
        let symbol = first.to_string();
        let entry = operators.infix(&symbol)?;
        self.advance();
        Some((symbol, entry.precedence))
    }

    // === Operands ===

    fn parse_operand(&mut self) -> ParserResult<AstNode> {
        self.skip_whitespace();
        let start = self.pos;
        if self.depth >= self.settings.max_depth {
            return self.too_deep(start);
        }

        self.depth += 1;
        let operand = self.parse_operand_at(start);
        self.depth -= 1;
        let mut node = operand?;
        if node.height > self.settings.max_depth {
            return self.too_deep(start);
        }

        while let Some(operator) = self.peek().filter(|c| self.context.operators().postfix(*c).is_some()) {
            self.advance();
            let start = node.start;
            node = AstNode::new(
                AstKind::UnaryOp {
                    operator: operator.to_string(),
                    operand: Box::new(node),
                    postfix: true,
                },
                start,
                self.pos,
            );
            if node.height > self.settings.max_depth {
                return self.too_deep(start);
            }
        }
        Ok(node)
    }

    /// Give up on a subtree that would exceed `max_depth` levels. Tolerant
    /// mode skips the rest of the input and leaves an invalid placeholder.
    fn too_deep(&mut self, start: usize) -> ParserResult<AstNode> {
        self.fail(
            format!("Formula nested deeper than {} levels", self.settings.max_depth),
            start,
            ErrorCode::NESTING_TOO_DEEP,
        )?;
        self.pos = self.chars.len();
        Ok(AstNode::new(AstKind::Undef, start, self.pos).invalid())
    }

    fn parse_operand_at(&mut self, start: usize) -> ParserResult<AstNode> {
        let c = match self.peek() {
            Some(c) if !self.is_terminator(c) => c,
            _ => return Ok(AstNode::undef(start)),
        };
        let decimal = self.settings.separators.decimal();

        if c.is_ascii_digit() || (c == decimal && self.peek_at(1).map_or(false, |d| d.is_ascii_digit())) {
            return self.parse_number(start);
        }
        if is_quote(c) {
            return self.parse_string(start);
        }
        match c {
            '[' => return self.parse_list(start),
            '(' => return self.parse_group(start),
            '?' => return self.parse_condition(start),
            _ => {}
        }
        if let Some(operator) = self.context.operators().prefix(c) {
            self.advance();
            let mut operand = self.parse_operand()?;
            if operand.is_undef() {
                self.fail(
                    format!("Expected expression after '{}'", operator.symbol()),
                    self.pos,
                    ErrorCode::EXPECTED_EXPRESSION,
                )?;
                operand.invalid = true;
            }
            return Ok(AstNode::new(
                AstKind::UnaryOp {
                    operator: c.to_string(),
                    operand: Box::new(operand),
                    postfix: false,
                },
                start,
                self.pos,
            ));
        }
        if is_identifier_start(c) {
            return self.parse_identifier(start);
        }

        self.fail(format!("Unexpected character '{c}'"), start, ErrorCode::UNEXPECTED_CHAR)?;
        self.advance();
        Ok(AstNode::new(AstKind::Undef, start, self.pos).invalid())
    }

    fn skip_digits(&mut self, radix: u32) {
        while self.peek().map_or(false, |c| c.is_digit(radix)) {
            self.advance();
        }
    }

    fn parse_number(&mut self, start: usize) -> ParserResult<AstNode> {
        let decimal = self.settings.separators.decimal();
        self.skip_digits(10);

        let hex = self.text(start, self.pos) == "0"
            && matches!(self.peek(), Some('x' | 'X'))
            && self.peek_at(1).map_or(false, |c| c.is_ascii_hexdigit());
        if hex {
            self.advance();
            let digits_start = self.pos;
            self.skip_digits(16);
            let digits = self.text(digits_start, self.pos);
            if self.continues_identifier() {
                return self.parse_identifier(start);
            }
            let value = match u64::from_str_radix(&digits, 16) {
                Ok(value) => value as f64,
                Err(_) => {
                    self.fail(format!("Invalid hex number '{digits}'"), start, ErrorCode::UNEXPECTED_CHAR)?;
                    return Ok(self.number_node(start, 0.0).invalid());
                }
            };
            return Ok(self.number_node(start, value));
        }

        if self.peek() == Some(decimal) {
            self.advance();
            self.skip_digits(10);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent = match self.peek_at(1) {
                Some('+' | '-') => self.peek_at(2).map_or(false, |c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent {
                self.pos += 2;
                self.skip_digits(10);
            }
        }

        // `100mV` is a name, not a malformed number
        if self.continues_identifier() {
            return self.parse_identifier(start);
        }

        let text = self.text(start, self.pos).replace(decimal, ".");
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(self.number_node(start, value)),
            Ok(_) => {
                self.fail(format!("Number '{text}' is out of range"), start, ErrorCode::UNEXPECTED_CHAR)?;
                Ok(self.number_node(start, 0.0).invalid())
            }
            Err(_) => {
                self.fail(format!("Invalid number '{text}'"), start, ErrorCode::UNEXPECTED_CHAR)?;
                Ok(self.number_node(start, 0.0).invalid())
            }
        }
    }

    fn continues_identifier(&self) -> bool {
        self.peek().map_or(false, |c| c.is_alphabetic() || c == '_')
    }

    fn number_node(&self, start: usize, value: f64) -> AstNode {
        AstNode::new(
            AstKind::Number {
                value,
                text: self.text(start, self.pos),
            },
            start,
            self.pos,
        )
    }

    fn parse_string(&mut self, start: usize) -> ParserResult<AstNode> {
        self.advance();
        let mut source = String::new();
        let mut closed = false;
        while let Some(c) = self.peek() {
            self.advance();
            if c == '\\' {
                source.push(c);
                if let Some(escaped) = self.peek() {
                    source.push(escaped);
                    self.advance();
                }
            } else if is_quote(c) {
                closed = true;
                break;
            } else {
                source.push(c);
            }
        }

        let mut node = AstNode::new(AstKind::String { value: source }, start, self.pos);
        if !closed {
            self.fail("Expected closing quote", start, ErrorCode::EXPECTED_QUOTE)?;
            node.invalid = true;
        }
        Ok(node)
    }

    fn parse_list(&mut self, start: usize) -> ParserResult<AstNode> {
        self.advance();
        let (params, invalid) = self.parse_params(']')?;
        let mut node = AstNode::new(AstKind::List { params }, start, self.pos);
        node.invalid = invalid;
        Ok(node)
    }

    fn parse_group(&mut self, start: usize) -> ParserResult<AstNode> {
        self.advance();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.fail("Expected expression inside brackets", self.pos, ErrorCode::EXPECTED_EXPRESSION)?;
            self.advance();
            return Ok(AstNode::new(AstKind::Undef, start, self.pos).invalid());
        }

        let mut node = self.parse_expression()?;
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
        } else {
            self.fail("Expected ')'", self.pos, ErrorCode::EXPECTED_BRACKET_RIGHT)?;
            node.invalid = true;
        }
        node.use_brackets = true;
        node.start = start;
        node.end = self.pos;
        Ok(node)
    }

    fn parse_condition(&mut self, start: usize) -> ParserResult<AstNode> {
        self.advance();
        self.skip_whitespace();
        if self.peek() != Some('(') {
            self.fail("Expected '(' after '?'", self.pos, ErrorCode::EXPECTED_BRACKET_LEFT)?;
            return Ok(AstNode::new(AstKind::Undef, start, self.pos).invalid());
        }
        self.advance();

        let (mut params, mut invalid) = self.parse_params(')')?;
        if params.len() != 3 {
            self.fail(
                format!("Condition expects 3 parameters, found {}", params.len()),
                start,
                ErrorCode::EXPECTED_SEPARATOR,
            )?;
            let pos = self.pos;
            params.resize_with(3, || AstNode::undef(pos));
            invalid = true;
        }
        let mut node = AstNode::new(AstKind::Condition { params }, start, self.pos);
        node.invalid = invalid;
        Ok(node)
    }

    fn is_identifier_char(&self, c: char) -> bool {
        match c {
            // sheet qualifier, but not the start of `!=`
            '!' => self.peek_at(1) != Some('='),
            '_' | '$' | '.' | ':' => true,
            c => c.is_alphanumeric(),
        }
    }

    fn parse_identifier(&mut self, start: usize) -> ParserResult<AstNode> {
        self.pos = start;
        while self.peek().map_or(false, |c| self.is_identifier_char(c)) {
            self.advance();
        }
        let name = self.text(start, self.pos);

        if self.peek() != Some('(') {
            return Ok(AstNode::new(AstKind::Identifier { name }, start, self.pos));
        }

        let mut invalid = false;
        if !self.context.has_function(&name) {
            self.fail(format!("Unknown function '{name}'"), start, ErrorCode::UNKNOWN_FUNCTION)?;
            invalid = true;
        }
        self.advance();
        let (params, params_invalid) = self.parse_params(')')?;
        let mut node = AstNode::new(AstKind::Function { name, params }, start, self.pos);
        node.invalid = invalid || params_invalid;
        Ok(node)
    }

    /// Pop the top operator and its two operands into a binary node. A flat
    /// operator chain grows one level per operator, so the height limit is
    /// checked here as well as for nested operands.
    fn reduce(
        &mut self,
        operands: &mut Vec<AstNode>,
        operators: &mut Vec<(String, u8)>,
    ) -> ParserResult<()> {
        if let (Some((operator, _)), Some(right), Some(left)) =
            (operators.pop(), operands.pop(), operands.pop())
        {
            let start = left.start;
            let end = right.end;
            let node = AstNode::new(
                AstKind::BinaryOp {
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                start,
                end,
            );
            if node.height > self.settings.max_depth {
                operands.push(self.too_deep(start)?);
            } else {
                operands.push(node);
            }
        }
        Ok(())
    }

    /// Parameters up to and including `close`. Empty slots become undef
    /// nodes, so `f(,,)` has three parameters.
    fn parse_params(&mut self, close: char) -> ParserResult<(Vec<AstNode>, bool)> {
        let separator = self.settings.separators.parameter();
        let mut params = Vec::new();
        let mut invalid = false;

        self.skip_whitespace();
        if self.peek() == Some(close) {
            self.advance();
            return Ok((params, invalid));
        }

        loop {
            params.push(self.parse_expression()?);
            self.skip_whitespace();
            match self.peek() {
                Some(c) if c == separator => self.advance(),
                Some(c) if c == close => {
                    self.advance();
                    break;
                }
                None => {
                    self.fail(format!("Expected '{close}'"), self.pos, ErrorCode::EXPECTED_BRACKET_RIGHT)?;
                    invalid = true;
                    break;
                }
                Some(c @ (')' | ']')) => {
                    self.fail(
                        format!("Expected '{close}' but found '{c}'"),
                        self.pos,
                        ErrorCode::EXPECTED_BRACKET_RIGHT,
                    )?;
                    self.advance();
                    invalid = true;
                    break;
                }
                Some(c) => {
                    // tolerant mode resumes with the next parameter
                    self.fail(
                        format!("Expected '{separator}' or '{close}' but found '{c}'"),
                        self.pos,
                        ErrorCode::EXPECTED_SEPARATOR,
                    )?;
                    invalid = true;
                }
            }
        }
        Ok((params, invalid))
    }
}
