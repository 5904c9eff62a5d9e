//! In-memory sheet used by `ssheet eval`
//!
//! Cells are addressed A1-style. Cell and range names in formulas become
//! references that look their target up by name on every access, so cells
//! may be defined in any order.

use ahash::AHashMap;
use anyhow::{anyhow, Context, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use streamsheets_parser::{
    AstKind, AstNode, Cell, CellAddress, CellRange, ContextSettings, DefaultParserContext,
    FunctionTable, Operand, OperatorTable, Parser, ParserContext, ParserResult, Reference,
    ReferenceKind, Term, Value,
};

/// Position of `name` without `$` markers
fn key(name: &str) -> Option<CellAddress> {
    CellAddress::parse(name).map(|address| CellAddress::new(address.row, address.col))
}

#[derive(Default)]
pub struct Sheet {
    cells: RefCell<AHashMap<CellAddress, Rc<Cell>>>,
    order: RefCell<Vec<CellAddress>>,
}

impl Sheet {
    pub fn new() -> Rc<Sheet> {
        Rc::new(Sheet::default())
    }

    pub fn cell(&self, name: &str) -> Option<Rc<Cell>> {
        self.cell_at(key(name)?)
    }

    fn cell_at(&self, address: CellAddress) -> Option<Rc<Cell>> {
        self.cells.borrow().get(&address).cloned()
    }

    /// Cell names in definition order
    pub fn names(&self) -> Vec<String> {
        self.order.borrow().iter().map(CellAddress::to_string).collect()
    }

    /// Parse `formula` into cell `name`, replacing any previous term.
    pub fn set(&self, context: &SheetContext, name: &str, formula: &str) -> Result<Rc<Cell>> {
        let address = key(name).ok_or_else(|| anyhow!("'{}' is not a cell name", name))?;
        let term = Parser::parse(formula, context)
            .with_context(|| format!("Failed to parse cell {}: {}", name, formula))?;
        if let Some(cell) = self.cell_at(address) {
            cell.set_term(Some(term));
            return Ok(cell);
        }

        let cell = Rc::new(Cell::with_term(term));
        self.cells.borrow_mut().insert(address, cell.clone());
        self.order.borrow_mut().push(address);
        cell.init(i64::from(address.row), i64::from(address.col));
        Ok(cell)
    }

    /// Evaluate every cell in definition order, `passes` times, so that
    /// values settle along reference chains defined out of order.
    pub fn recalc(&self, passes: usize) {
        let cells: Vec<Rc<Cell>> = self
            .order
            .borrow()
            .iter()
            .filter_map(|address| self.cell_at(*address))
            .collect();
        for _ in 0..passes {
            cells.iter().for_each(|cell| cell.evaluate());
        }
    }

    /// Names of cells whose formula reaches back to the cell itself.
    pub fn cyclic_cells(self: &Rc<Self>) -> Vec<String> {
        self.names()
            .into_iter()
            .filter(|name| {
                let Some(cell) = self.cell(name) else {
                    return false;
                };
                let own: Rc<dyn Reference> = Rc::new(CellRef::new(name, self));
                let term = cell.term();
                term.as_ref().map_or(false, |term| term.has_cycle(Some(&own)))
            })
            .collect()
    }

    /// Dispose every cell.
    pub fn clear(&self) {
        let cells: Vec<Rc<Cell>> = self.cells.borrow_mut().drain().map(|(_, cell)| cell).collect();
        cells.iter().for_each(|cell| cell.dispose());
        self.order.borrow_mut().clear();
    }
}

/// Single-cell reference resolved by name
pub struct CellRef {
    name: String,
    sheet: Weak<Sheet>,
}

impl CellRef {
    pub fn new(name: &str, sheet: &Rc<Sheet>) -> Self {
        Self {
            name: name.to_string(),
            sheet: Rc::downgrade(sheet),
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
        self.sheet.upgrade()?.cell(&self.name)
    }

    fn is_same(&self, other: &dyn Reference) -> bool {
        other.kind() == ReferenceKind::Cell && key(&self.name) == key(&other.to_string())
    }
}

/// Rectangular range like `A1:B3`, evaluating to the list of its cell values
pub struct RangeRef {
    range: CellRange,
    text: String,
    sheet: Weak<Sheet>,
}

impl RangeRef {
    pub fn new(text: &str, sheet: &Rc<Sheet>) -> Option<Self> {
        Some(Self {
            range: CellRange::parse(text)?,
            text: text.to_string(),
            sheet: Rc::downgrade(sheet),
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
        self.sheet.upgrade().is_some()
    }

    fn value(&self) -> Value {
        Value::List(self.targets().iter().map(|cell| cell.value()).collect())
    }

    fn target(&self) -> Option<Rc<Cell>> {
        self.targets().into_iter().next()
    }

    fn targets(&self) -> Vec<Rc<Cell>> {
        let Some(sheet) = self.sheet.upgrade() else {
            return Vec::new();
        };
        self.range.cells().filter_map(|address| sheet.cell_at(address)).collect()
    }
}

/// Parser context turning cell and range names into references
pub struct SheetContext {
    inner: DefaultParserContext,
    sheet: Weak<Sheet>,
}

impl SheetContext {
    pub fn new(sheet: &Rc<Sheet>, settings: ContextSettings, functions: &FunctionTable) -> Self {
        Self {
            inner: DefaultParserContext::with_settings(settings).with_functions(functions),
            sheet: Rc::downgrade(sheet),
        }
    }
}

impl ParserContext for SheetContext {
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
        let (AstKind::Identifier { name }, Some(sheet)) = (&node.kind, self.sheet.upgrade()) else {
            return Ok(None);
        };
        if name.contains(':') {
            return Ok(RangeRef::new(name, &sheet).map(|range| Term::leaf(Operand::reference(range))));
        }
        if CellAddress::parse(name).is_some() {
            return Ok(Some(Term::leaf(Operand::reference(CellRef::new(name, &sheet)))));
        }
        Ok(None)
    }
}
