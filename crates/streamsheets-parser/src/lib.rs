//! # streamsheets-parser
//!
//! Formula language core for streamsheets.
//!
//! This crate provides:
//! - Formula tokenizing (text → AST) with locale-aware separators and a
//!   tolerant mode for incomplete editor input
//! - Transformation (AST → term tree) through a pluggable [`ParserContext`]
//! - Term evaluation with reference following and cycle detection
//! - [`Cell`], the sheet-facing holder of a term and its cached value
//!
//! Sheets, references and built-in functions live outside this crate; they
//! plug in through [`ParserContext`], the [`Reference`] trait and the
//! [`FunctionTable`].
//!
//! ## Example
//!
//! ```rust
//! use streamsheets_parser::{formula_fn, DefaultParserContext, Parser, ParserContext, Value};
//!
//! let mut context = DefaultParserContext::new();
//! context.set_function("DOUBLE", formula_fn(|_, params| {
//!     Value::Number(params.first().map_or(0.0, |p| p.value().to_number()) * 2.0)
//! }));
//!
//! let term = Parser::parse("=?(DOUBLE(2) > 3, \"big\", \"small\")", &context).unwrap();
//! assert_eq!(term.value(), Value::from("big"));
//! ```

pub mod address;
pub mod ast;
pub mod cell;
pub mod context;
pub mod error;
pub mod function;
pub mod locale;
pub mod operand;
pub mod operator;
pub mod parser;
pub mod term;
pub mod tokenizer;
pub mod transformer;
pub mod value;

pub use address::{CellAddress, CellRange};
pub use ast::{AstKind, AstNode};
pub use cell::Cell;
pub use context::{ContextSettings, DefaultParserContext, ParserContext};
pub use error::{ErrorCategory, ErrorCode, ParserError, ParserResult};
pub use function::{formula_fn, CallContext, FormulaFunction, FunctionTable, TermContext};
pub use locale::{Locale, Separators};
pub use operand::{Operand, OperandKind, Reference, ReferenceKind, StringOperand};
pub use operator::{BinaryOperator, BoolOperator, Operator, OperatorTable, UnaryOperator, UnitOperator};
pub use parser::{Parser, TokenInfo, TokenKind};
pub use term::{FuncTerm, Term, TermNode};
pub use tokenizer::create_ast;
pub use transformer::create_term;
pub use value::Value;
