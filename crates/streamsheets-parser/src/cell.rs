//! Cells: the sheet-facing holder of a term and its last computed value

use crate::function::TermContext;
use crate::term::{Term, TermNode};
use crate::value::Value;
use serde_json::{Map, Value as Json};
use std::cell::{Cell as Slot, Ref, RefCell, RefMut};

/// Display text used in place of object and list values
pub const OBJECT_PLACEHOLDER: &str = "{ JSON Object }";

/// A sheet position holding an optional term and its cached value.
///
/// The value is computed by [`Cell::evaluate`] and cached until the next
/// evaluation, so references into this cell read the last computed value
/// without re-running its term. Cells are shared as `Rc<Cell>` between the
/// sheet and the references pointing at them, hence the interior mutability.
#[derive(Debug)]
pub struct Cell {
    value: RefCell<Value>,
    cell_value: RefCell<Value>,
    term: RefCell<Option<Term>>,
    references: RefCell<Vec<String>>,
    info: RefCell<Map<String, Json>>,
    row: Slot<i64>,
    col: Slot<i64>,
    initialized: Slot<bool>,
}

impl Cell {
    pub fn new(value: Value, term: Option<Term>) -> Self {
        let cell = Self {
            cell_value: RefCell::new(display_value(&value)),
            value: RefCell::new(value),
            term: RefCell::new(None),
            references: RefCell::new(Vec::new()),
            info: RefCell::new(Map::new()),
            row: Slot::new(0),
            col: Slot::new(0),
            initialized: Slot::new(false),
        };
        cell.set_term(term);
        cell
    }

    /// Cell holding a plain value and no term
    pub fn with_value(value: Value) -> Self {
        Self::new(value, None)
    }

    /// Cell for a formula term; the value is computed on [`Cell::init`].
    pub fn with_term(term: Term) -> Self {
        Self::new(Value::Undefined, Some(term))
    }

    // === Placement ===

    /// Place the cell and compute its first value. Later calls only move it.
    pub fn init(&self, row: i64, col: i64) {
        self.row.set(row);
        self.col.set(col);
        if !self.initialized.replace(true) {
            self.evaluate();
        }
    }

    pub fn row(&self) -> i64 {
        self.row.get()
    }

    pub fn col(&self) -> i64 {
        self.col.get()
    }

    /// True once [`Cell::dispose`] detached the cell from its sheet.
    pub fn is_disposed(&self) -> bool {
        self.row.get() < 0
    }

    // === Term ===

    pub fn term(&self) -> Ref<'_, Option<Term>> {
        self.term.borrow()
    }

    /// Replace the term. The previous term is dropped, which runs the
    /// dispose listeners registered on its function terms.
    pub fn set_term(&self, term: Option<Term>) {
        let references = term
            .as_ref()
            .map(|term| {
                term.find_references(false)
                    .iter()
                    .map(|reference| reference.to_string())
                    .collect()
            })
            .unwrap_or_default();
        *self.references.borrow_mut() = references;
        let previous = self.term.replace(term);
        drop(previous);
    }

    /// A term is a formula unless it is empty or a plain non-reference leaf.
    pub fn has_formula(&self) -> bool {
        match self.term.borrow().as_ref() {
            Some(term) if matches!(term.node(), TermNode::Null) => false,
            Some(term) => !matches!(term.operand(), Some(operand) if !operand.is_reference()),
            None => false,
        }
    }

    /// Formula text, if the cell has a formula
    pub fn formula(&self) -> Option<String> {
        if self.has_formula() {
            self.term.borrow().as_ref().map(Term::to_string)
        } else {
            None
        }
    }

    /// Text of every reference directly in the term
    pub fn references(&self) -> Vec<String> {
        self.references.borrow().clone()
    }

    // === Values ===

    /// Last computed value
    pub fn value(&self) -> Value {
        self.value.borrow().clone()
    }

    /// Value to display; objects and lists are shown as a placeholder.
    pub fn cell_value(&self) -> Value {
        self.cell_value.borrow().clone()
    }

    /// Set the cached value directly, e.g. when restoring a stored sheet.
    pub fn set_value(&self, value: Value) {
        *self.cell_value.borrow_mut() = display_value(&value);
        *self.value.borrow_mut() = value;
    }

    /// Recompute the value from the term.
    ///
    /// NaN is stored as `0`, and so is an undefined result of a term that
    /// is a cell reference: a reference to nothing reads as zero.
    pub fn evaluate(&self) {
        let computed = {
            let term = self.term.borrow();
            term.as_ref().map(|term| {
                let value = checked_value(term, term.value());
                let display = term
                    .term_context()
                    .and_then(TermContext::display)
                    .map(|display| checked_value(term, display))
                    .unwrap_or_else(|| value.clone());
                (value, display)
            })
        };
        if let Some((value, display)) = computed {
            *self.value.borrow_mut() = value;
            *self.cell_value.borrow_mut() = display_value(&display);
        }
    }

    /// Repair a restored value without re-running side effects.
    ///
    /// Only an undefined or error value is recomputed, and only if the term
    /// contains no function term that could fire a second time.
    pub fn update(&self) {
        let stale = {
            let value = self.value.borrow();
            value.is_nullish() || value.is_error()
        };
        let pure = self
            .term
            .borrow()
            .as_ref()
            .map_or(false, |term| !term.has_function_terms());
        if stale && pure {
            self.evaluate();
        }
    }

    // === Info ===

    /// Free-form metadata set by functions, e.g. aggregation history
    pub fn info(&self) -> Ref<'_, Map<String, Json>> {
        self.info.borrow()
    }

    pub fn info_mut(&self) -> RefMut<'_, Map<String, Json>> {
        self.info.borrow_mut()
    }

    // === Lifecycle ===

    /// Detach and drop the term and mark the cell as removed.
    pub fn dispose(&self) {
        log::debug!("disposing cell at {}:{}", self.row.get(), self.col.get());
        self.set_term(None);
        self.info.borrow_mut().clear();
        self.row.set(-1);
    }
}

fn checked_value(term: &Term, value: Value) -> Value {
    match value {
        Value::Number(n) if n.is_nan() => Value::Number(0.0),
        Value::Undefined if term.has_cell_reference() => Value::Number(0.0),
        value => value,
    }
}

fn display_value(value: &Value) -> Value {
    match value {
        Value::Object(_) | Value::List(_) => Value::String(OBJECT_PLACEHOLDER.to_string()),
        value => value.clone(),
    }
}
