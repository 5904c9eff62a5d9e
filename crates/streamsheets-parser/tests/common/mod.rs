//! Common utilities for integration tests: an in-memory grid whose cell and
//! range references implement [`Reference`].
#![allow(dead_code)]

use ahash::AHashMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use streamsheets_parser::{
    AstKind, AstNode, Cell, CellAddress, CellRange, ContextSettings, DefaultParserContext,
    FormulaFunction, FunctionTable, Operand, OperatorTable, Parser, ParserContext, ParserResult,
    Reference, ReferenceKind, Term, Value,
};

/// Lookup key for an address: its position without `$` markers.
pub fn key(name: &str) -> Option<CellAddress> {
    CellAddress::parse(name).map(|address| CellAddress::new(address.row, address.col))
}

/// Cells keyed by position
#[derive(Default)]
pub struct Grid {
    cells: RefCell<AHashMap<CellAddress, Rc<Cell>>>,
    order: RefCell<Vec<CellAddress>>,
}

impl Grid {
    pub fn new() -> Rc<Grid> {
        Rc::new(Grid::default())
    }

    pub fn cell(&self, name: &str) -> Option<Rc<Cell>> {
        self.cell_at(key(name)?)
    }

    pub fn cell_at(&self, address: CellAddress) -> Option<Rc<Cell>> {
        self.cells.borrow().get(&address).cloned()
    }

    pub fn value(&self, name: &str) -> Value {
        self.cell(name).map(|cell| cell.value()).unwrap_or_default()
    }

    /// Parse `formula` into the cell `name` and evaluate it once.
    pub fn set(&self, context: &GridContext, name: &str, formula: &str) -> ParserResult<Rc<Cell>> {
        let term = Parser::parse(formula, context)?;
        let address = key(name).unwrap_or_else(|| panic!("'{name}' is not a cell address"));
        if let Some(cell) = self.cell_at(address) {
            cell.set_term(Some(term));
            cell.evaluate();
            return Ok(cell);
        }

        let cell = Rc::new(Cell::with_term(term));
        self.cells.borrow_mut().insert(address, cell.clone());
        self.order.borrow_mut().push(address);
        cell.init(i64::from(address.row), i64::from(address.col));
        Ok(cell)
    }

    pub fn remove(&self, name: &str) {
        let Some(address) = key(name) else {
            return;
        };
        let removed = self.cells.borrow_mut().remove(&address);
        if let Some(cell) = removed {
            cell.dispose();
        }
        self.order.borrow_mut().retain(|known| *known != address);
    }

    /// Evaluate every cell in insertion order, `passes` times.
    pub fn recalc(&self, passes: usize) {
        let cells: Vec<Rc<Cell>> = self
            .order
            .borrow()
            .iter()
            .filter_map(|address| self.cell_at(*address))
            .collect();
        for _ in 0..passes {
            for cell in &cells {
                cell.evaluate();
            }
        }
    }
}

/// Reference to a single cell, resolved by name on every access.
pub struct CellRef {
    name: String,
    grid: Weak<Grid>,
}

impl CellRef {
    pub fn new(name: &str, grid: &Rc<Grid>) -> Self {
        Self {
            name: name.to_string(),
            grid: Rc::downgrade(grid),
        }
    }
}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellRef({})", self.name)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Reference for CellRef {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::Cell
    }

    fn is_resolved(&self) -> bool {
        self.target().is_some()
    }

    fn value(&self) -> Value {
        self.target().map(|cell| cell.value()).unwrap_or_default()
    }

    fn target(&self) -> Option<Rc<Cell>> {
        self.grid.upgrade()?.cell(&self.name)
    }

    fn is_same(&self, other: &dyn Reference) -> bool {
        other.kind() == ReferenceKind::Cell && key(&self.name) == key(&other.to_string())
    }
}

/// Rectangular range such as `A1:B3`
pub struct RangeRef {
    range: CellRange,
    text: String,
    grid: Weak<Grid>,
}

impl RangeRef {
    pub fn new(text: &str, grid: &Rc<Grid>) -> Option<Self> {
        Some(Self {
            range: CellRange::parse(text)?,
            text: text.to_string(),
            grid: Rc::downgrade(grid),
        })
    }
}

impl fmt::Debug for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RangeRef({})", self.text)
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Reference for RangeRef {
    fn kind(&self) -> ReferenceKind {
        ReferenceKind::Range
    }

    fn is_resolved(&self) -> bool {
        self.grid.upgrade().is_some()
    }

    fn value(&self) -> Value {
        Value::List(self.targets().iter().map(|cell| cell.value()).collect())
    }

    fn target(&self) -> Option<Rc<Cell>> {
        self.targets().into_iter().next()
    }

    fn targets(&self) -> Vec<Rc<Cell>> {
        let Some(grid) = self.grid.upgrade() else {
            return Vec::new();
        };
        self.range.cells().filter_map(|address| grid.cell_at(address)).collect()
    }
}

/// Parser context resolving cell and range names against a grid
pub struct GridContext {
    inner: DefaultParserContext,
    grid: Weak<Grid>,
}

impl GridContext {
    pub fn new(grid: &Rc<Grid>) -> Self {
        Self::with_settings(grid, ContextSettings::default())
    }

    pub fn with_settings(grid: &Rc<Grid>, settings: ContextSettings) -> Self {
        Self {
            inner: DefaultParserContext::with_settings(settings),
            grid: Rc::downgrade(grid),
        }
    }

    pub fn settings_mut(&mut self) -> &mut ContextSettings {
        self.inner.settings_mut()
    }

    pub fn with_function(mut self, name: &str, function: FormulaFunction) -> Self {
        self.set_function(name, function);
        self
    }
}

impl ParserContext for GridContext {
    fn settings(&self) -> &ContextSettings {
        self.inner.settings()
    }

    fn functions(&self) -> &FunctionTable {
        self.inner.functions()
    }

    fn functions_mut(&mut self) -> &mut FunctionTable {
        self.inner.functions_mut()
    }

    fn operators(&self) -> &OperatorTable {
        self.inner.operators()
    }

    fn create_reference_term(
        &self,
        node: &AstNode,
        _parent: Option<&AstNode>,
    ) -> ParserResult<Option<Term>> {
        let (AstKind::Identifier { name }, Some(grid)) = (&node.kind, self.grid.upgrade()) else {
            return Ok(None);
        };
        if name.contains(':') {
            return Ok(RangeRef::new(name, &grid).map(|range| Term::leaf(Operand::reference(range))));
        }
        if CellAddress::parse(name).is_some() {
            return Ok(Some(Term::leaf(Operand::reference(CellRef::new(name, &grid)))));
        }
        Ok(None)
    }
}

/// Function summing numbers, flattening lists (ranges evaluate to lists).
pub fn sum() -> FormulaFunction {
    streamsheets_parser::formula_fn(|_, params| {
        fn add(value: &Value) -> f64 {
            match value {
                Value::List(items) => items.iter().map(add).sum(),
                value => value.as_number().unwrap_or(0.0),
            }
        }
        Value::Number(params.iter().map(|param| add(&param.value())).sum())
    })
}
