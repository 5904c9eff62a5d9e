//! Parser contexts
//!
//! A parser context is the strategy object consulted while tokenizing and
//! transforming: it supplies separators and error modes, the operator and
//! function tables, and hooks that let a sheet turn nodes into reference or
//! bound function terms.

use crate::ast::AstNode;
use crate::error::ParserResult;
use crate::function::{FormulaFunction, FunctionTable};
use crate::locale::Separators;
use crate::operator::OperatorTable;
use crate::term::Term;
use std::any::Any;
use std::rc::Rc;

/// Default limit on formula nesting. It bounds both bracket and call
/// nesting and the height of the term tree, so a chain of `n` binary
/// operators needs `n + 1` levels.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Parse settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSettings {
    pub separators: Separators,
    /// Reject unknown identifiers and missing operands
    pub strict: bool,
    /// Tolerant mode: never fail, mark malformed nodes invalid instead
    pub ignore_errors: bool,
    pub max_depth: usize,
}

impl ContextSettings {
    /// Use a separator pair; fails if both characters are equal.
    pub fn with_separators(mut self, decimal: char, parameter: char) -> ParserResult<Self> {
        self.separators = Separators::new(decimal, parameter)?;
        Ok(self)
    }

    pub fn with_locale(mut self, tag: &str) -> Self {
        self.separators = Separators::for_locale(tag);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            separators: Separators::DEFAULT,
            strict: false,
            ignore_errors: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Strategy consulted by the tokenizer and the transformer.
///
/// A context is owned by a single compilation session. Sessions that need
/// different functions or operators use different context instances.
pub trait ParserContext {
    fn settings(&self) -> &ContextSettings;

    fn functions(&self) -> &FunctionTable;

    fn functions_mut(&mut self) -> &mut FunctionTable;

    fn operators(&self) -> &OperatorTable;

    fn separators(&self) -> Separators {
        self.settings().separators
    }

    fn strict(&self) -> bool {
        self.settings().strict
    }

    fn ignore_errors(&self) -> bool {
        self.settings().ignore_errors
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions().has(name)
    }

    fn get_function(&self, name: &str) -> Option<FormulaFunction> {
        self.functions().get(name)
    }

    fn set_function(&mut self, name: &str, function: FormulaFunction) {
        self.functions_mut().set(name, function);
    }

    /// Scope handed to every function bound by the default transformer.
    fn function_scope(&self) -> Option<Rc<dyn Any>> {
        None
    }

    /// First refusal on every node: return a term to replace the default
    /// transformation, typically a reference leaf for `A1` or `A1:B2`.
    fn create_reference_term(
        &self,
        _node: &AstNode,
        _parent: Option<&AstNode>,
    ) -> ParserResult<Option<Term>> {
        Ok(None)
    }

    /// Build the term for a function node. `None` falls back to binding
    /// [`ParserContext::get_function`] and [`ParserContext::function_scope`].
    fn create_function_term(
        &self,
        _node: &AstNode,
        _parent: Option<&AstNode>,
    ) -> ParserResult<Option<Term>> {
        Ok(None)
    }
}

/// Context with its own settings and tables and no reference support.
#[derive(Debug, Clone, Default)]
pub struct DefaultParserContext {
    settings: ContextSettings,
    functions: FunctionTable,
    operators: OperatorTable,
}

impl DefaultParserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: ContextSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Context with custom separators; fails fast if they are equal.
    pub fn with_separators(decimal: char, parameter: char) -> ParserResult<Self> {
        Ok(Self::with_settings(
            ContextSettings::default().with_separators(decimal, parameter)?,
        ))
    }

    /// Start from a copy of `functions`.
    pub fn with_functions(mut self, functions: &FunctionTable) -> Self {
        self.functions = functions.clone();
        self
    }

    pub fn with_operators(mut self, operators: OperatorTable) -> Self {
        self.operators = operators;
        self
    }

    pub fn settings_mut(&mut self) -> &mut ContextSettings {
        &mut self.settings
    }

    pub fn operators_mut(&mut self) -> &mut OperatorTable {
        &mut self.operators
    }
}

impl ParserContext for DefaultParserContext {
    fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    fn functions_mut(&mut self) -> &mut FunctionTable {
        &mut self.functions
    }

    fn operators(&self) -> &OperatorTable {
        &self.operators
    }
}
