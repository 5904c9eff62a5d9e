//! Evaluable term trees
//!
//! A [`Term`] is either a leaf holding an [`Operand`] or an operation over
//! child terms. Values are never cached on a term: every call to
//! [`Term::value`] recomputes from the children, so a term can be evaluated
//! any number of times per recalculation. Only function terms may have side
//! effects, and those live in the bound function.

use crate::cell::Cell;
use crate::function::{CallContext, FormulaFunction, TermContext};
use crate::locale::Separators;
use crate::operand::{Operand, Reference, ReferenceKind};
use crate::operator::{calc_condition, Operator, UnaryOperator, UnitOperator};
use crate::value::Value;
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Shape of a term
#[derive(Debug, Clone)]
pub enum TermNode {
    Leaf(Operand),
    Unary {
        operator: UnaryOperator,
        operand: Box<Term>,
    },
    Unit {
        operator: UnitOperator,
        operand: Box<Term>,
    },
    /// Infix operation; `operator` is a binary or bool operator
    Binary {
        operator: Operator,
        left: Box<Term>,
        right: Box<Term>,
    },
    Condition {
        condition: Box<Term>,
        on_true: Box<Term>,
        on_false: Box<Term>,
    },
    Function(FuncTerm),
    List(Vec<Term>),
    /// Placeholder for a missing expression, e.g. an empty parameter
    Null,
}

/// Function call term: name, parameters and the bound implementation.
pub struct FuncTerm {
    name: String,
    params: Vec<Term>,
    function: Option<FormulaFunction>,
    scope: Option<Rc<dyn Any>>,
    context: TermContext,
}

impl FuncTerm {
    pub fn new(name: impl Into<String>, params: Vec<Term>) -> Self {
        Self {
            name: name.into(),
            params,
            function: None,
            scope: None,
            context: TermContext::new(),
        }
    }

    pub fn with_function(mut self, function: FormulaFunction) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_scope(mut self, scope: Rc<dyn Any>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Term] {
        &self.params
    }

    pub fn is_bound(&self) -> bool {
        self.function.is_some()
    }

    pub fn context(&self) -> &TermContext {
        &self.context
    }
}

/// Copies share the bound function and scope but get a fresh context:
/// stashed state belongs to one call site.
impl Clone for FuncTerm {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            params: self.params.clone(),
            function: self.function.clone(),
            scope: self.scope.clone(),
            context: TermContext::new(),
        }
    }
}

impl fmt::Debug for FuncTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncTerm")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("bound", &self.function.is_some())
            .field("context", &self.context)
            .finish()
    }
}

/// Node of an evaluable formula tree
#[derive(Debug, Clone)]
pub struct Term {
    node: TermNode,
    invalid: bool,
    use_brackets: bool,
}

impl Term {
    fn from_node(node: TermNode) -> Self {
        Self {
            node,
            invalid: false,
            use_brackets: false,
        }
    }

    pub fn leaf(operand: Operand) -> Self {
        Self::from_node(TermNode::Leaf(operand))
    }

    /// Leaf term for a plain value. Lists, objects and errors are stored as text.
    pub fn value_term(value: Value) -> Self {
        Self::leaf(Operand::from(value))
    }

    pub fn unary(operator: UnaryOperator, operand: Term) -> Self {
        Self::from_node(TermNode::Unary {
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn unit(operator: UnitOperator, operand: Term) -> Self {
        Self::from_node(TermNode::Unit {
            operator,
            operand: Box::new(operand),
        })
    }

    /// Infix term; `operator` must be a binary or bool operator.
    pub fn binary(operator: Operator, left: Term, right: Term) -> Self {
        debug_assert!(operator.is_infix());
        Self::from_node(TermNode::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn condition(condition: Term, on_true: Term, on_false: Term) -> Self {
        Self::from_node(TermNode::Condition {
            condition: Box::new(condition),
            on_true: Box::new(on_true),
            on_false: Box::new(on_false),
        })
    }

    pub fn function(func: FuncTerm) -> Self {
        Self::from_node(TermNode::Function(func))
    }

    pub fn list(items: Vec<Term>) -> Self {
        Self::from_node(TermNode::List(items))
    }

    pub fn null() -> Self {
        Self::from_node(TermNode::Null)
    }

    // === Accessors ===

    pub fn node(&self) -> &TermNode {
        &self.node
    }

    pub fn operand(&self) -> Option<&Operand> {
        match &self.node {
            TermNode::Leaf(operand) => Some(operand),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.node {
            TermNode::Unary { operator, .. } => Some(Operator::Unary(*operator)),
            TermNode::Unit { operator, .. } => Some(Operator::Unit(*operator)),
            TermNode::Binary { operator, .. } => Some(*operator),
            TermNode::Condition { .. } => Some(Operator::Condition),
            _ => None,
        }
    }

    /// Left operand of an infix term, or the `onTrue` branch of a condition
    pub fn left(&self) -> Option<&Term> {
        match &self.node {
            TermNode::Binary { left, .. } => Some(&**left),
            TermNode::Condition { on_true, .. } => Some(&**on_true),
            _ => None,
        }
    }

    /// Right operand of an infix term, or the `onFalse` branch of a condition
    pub fn right(&self) -> Option<&Term> {
        match &self.node {
            TermNode::Binary { right, .. } => Some(&**right),
            TermNode::Condition { on_false, .. } => Some(&**on_false),
            _ => None,
        }
    }

    /// Parameters of a function or list term
    pub fn params(&self) -> &[Term] {
        match &self.node {
            TermNode::Function(func) => func.params(),
            TermNode::List(items) => items,
            _ => &[],
        }
    }

    pub fn as_function(&self) -> Option<&FuncTerm> {
        match &self.node {
            TermNode::Function(func) => Some(func),
            _ => None,
        }
    }

    pub fn term_context(&self) -> Option<&TermContext> {
        self.as_function().map(FuncTerm::context)
    }

    pub fn use_brackets(&self) -> bool {
        self.use_brackets
    }

    pub fn set_use_brackets(&mut self, use_brackets: bool) {
        self.use_brackets = use_brackets;
    }

    pub fn set_invalid(&mut self, invalid: bool) {
        self.invalid = invalid;
    }

    fn children(&self) -> Vec<&Term> {
        match &self.node {
            TermNode::Leaf(_) | TermNode::Null => Vec::new(),
            TermNode::Unary { operand, .. } | TermNode::Unit { operand, .. } => vec![&**operand],
            TermNode::Binary { left, right, .. } => vec![&**left, &**right],
            TermNode::Condition {
                condition,
                on_true,
                on_false,
            } => vec![&**condition, &**on_true, &**on_false],
            TermNode::Function(func) => func.params.iter().collect(),
            TermNode::List(items) => items.iter().collect(),
        }
    }

    // === Evaluation ===

    /// Compute the current value. Never cached and never panics.
    pub fn value(&self) -> Value {
        match &self.node {
            TermNode::Leaf(operand) => operand.value(),
            TermNode::Unary { operator, operand } => operator.calc(operand),
            TermNode::Unit { operator, operand } => operator.calc(operand),
            TermNode::Binary {
                operator,
                left,
                right,
            } => match operator {
                Operator::Binary(op) => op.calc(left, right),
                Operator::Bool(op) => op.calc(left, right),
                _ => Value::Undefined,
            },
            TermNode::Condition {
                condition,
                on_true,
                on_false,
            } => calc_condition(condition, on_true, on_false),
            TermNode::Function(func) => match &func.function {
                Some(function) => {
                    let call = CallContext {
                        name: &func.name,
                        term: self,
                        scope: func.scope.as_deref(),
                    };
                    function(&call, &func.params)
                }
                None => Value::Undefined,
            },
            TermNode::List(items) => Value::List(items.iter().map(Term::value).collect()),
            TermNode::Null => Value::Undefined,
        }
    }

    /// Value to display: a function may publish a display value that
    /// differs from its logical one through its [`TermContext`].
    pub fn cell_value(&self) -> Value {
        self.term_context()
            .and_then(TermContext::display)
            .unwrap_or_else(|| self.value())
    }

    // === Structure queries ===

    /// True for a non-reference leaf, optionally negated by unary minus.
    pub fn is_static(&self) -> bool {
        match &self.node {
            TermNode::Leaf(operand) => !operand.is_reference(),
            TermNode::Null => true,
            TermNode::Unary {
                operator: UnaryOperator::Negate,
                operand,
            } => operand.is_static(),
            _ => false,
        }
    }

    /// True if this term or any descendant was malformed at parse time.
    pub fn is_invalid(&self) -> bool {
        self.invalid || self.children().into_iter().any(Term::is_invalid)
    }

    /// Leaf pointing at a sheet position that does not exist (yet).
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(&self.node, TermNode::Leaf(Operand::Reference(r)) if !r.is_resolved())
    }

    /// Leaf whose operand is a cell reference.
    pub fn has_cell_reference(&self) -> bool {
        matches!(&self.node, TermNode::Leaf(Operand::Reference(r)) if r.kind() == ReferenceKind::Cell)
    }

    pub fn has_function_terms(&self) -> bool {
        let mut found = false;
        self.traverse(
            &mut |term| {
                found = term.as_function().is_some();
                !found
            },
            false,
        );
        found
    }

    /// Structural equality, ignoring brackets and invalid flags.
    pub fn is_equal_to(&self, other: &Term) -> bool {
        match (&self.node, &other.node) {
            (TermNode::Leaf(a), TermNode::Leaf(b)) => a.is_equal_to(b),
            (
                TermNode::Unary {
                    operator: oa,
                    operand: a,
                },
                TermNode::Unary {
                    operator: ob,
                    operand: b,
                },
            ) => oa == ob && a.is_equal_to(b),
            (
                TermNode::Unit {
                    operator: oa,
                    operand: a,
                },
                TermNode::Unit {
                    operator: ob,
                    operand: b,
                },
            ) => oa == ob && a.is_equal_to(b),
            (
                TermNode::Binary {
                    operator: oa,
                    left: la,
                    right: ra,
                },
                TermNode::Binary {
                    operator: ob,
                    left: lb,
                    right: rb,
                },
            ) => oa == ob && la.is_equal_to(lb) && ra.is_equal_to(rb),
            (
                TermNode::Condition {
                    condition: ca,
                    on_true: ta,
                    on_false: fa,
                },
                TermNode::Condition {
                    condition: cb,
                    on_true: tb,
                    on_false: fb,
                },
            ) => ca.is_equal_to(cb) && ta.is_equal_to(tb) && fa.is_equal_to(fb),
            (TermNode::Function(a), TermNode::Function(b)) => {
                a.name.eq_ignore_ascii_case(&b.name) && params_equal(&a.params, &b.params)
            }
            (TermNode::List(a), TermNode::List(b)) => params_equal(a, b),
            (TermNode::Null, TermNode::Null) => true,
            _ => false,
        }
    }

    // === Lifecycle ===

    /// Deep structural copy. Function terms get fresh term contexts.
    pub fn copy(&self) -> Term {
        self.clone()
    }

    /// Tear the tree down now, running all dispose listeners.
    pub fn dispose(self) {
        drop(self);
    }

    // === Traversal ===

    /// Visit this term and all descendants depth first, parents before
    /// children. The visitor returns `false` to stop; `traverse` then
    /// returns `false` as well.
    ///
    /// With `follow_refs`, a reference leaf is not descended into; instead
    /// the terms of its target cells are traversed, each cell at most once.
    pub fn traverse(&self, visitor: &mut dyn FnMut(&Term) -> bool, follow_refs: bool) -> bool {
        let mut visited = HashSet::new();
        self.walk(visitor, follow_refs, &mut visited)
    }

    fn walk(
        &self,
        visitor: &mut dyn FnMut(&Term) -> bool,
        follow_refs: bool,
        visited: &mut HashSet<*const Cell>,
    ) -> bool {
        if !visitor(self) {
            return false;
        }
        if let TermNode::Leaf(Operand::Reference(reference)) = &self.node {
            if follow_refs {
                for cell in reference.targets() {
                    if !visited.insert(Rc::as_ptr(&cell)) {
                        continue;
                    }
                    let term = cell.term();
                    if let Some(term) = term.as_ref() {
                        if !term.walk(visitor, follow_refs, visited) {
                            return false;
                        }
                    }
                }
            }
            return true;
        }
        for child in self.children() {
            if !child.walk(visitor, follow_refs, visited) {
                return false;
            }
        }
        true
    }

    /// All distinct references in this tree, optionally following them into
    /// the terms of the referenced cells.
    pub fn find_references(&self, follow_refs: bool) -> Vec<Rc<dyn Reference>> {
        let mut found: Vec<Rc<dyn Reference>> = Vec::new();
        self.traverse(
            &mut |term| {
                if let Some(Operand::Reference(reference)) = term.operand() {
                    if !found.iter().any(|known| known.is_same(reference.as_ref())) {
                        found.push(reference.clone());
                    }
                }
                true
            },
            follow_refs,
        );
        found
    }

    /// Detect a reference cycle by following references into their cells.
    ///
    /// The traversal stops at the first reference equal to `start`. Without
    /// `start`, the first reference met becomes the one to look for.
    pub fn has_cycle(&self, start: Option<&Rc<dyn Reference>>) -> bool {
        let mut seed: Option<Rc<dyn Reference>> = start.cloned();
        let mut cycle = false;
        self.traverse(
            &mut |term| {
                if let Some(Operand::Reference(reference)) = term.operand() {
                    if let Some(known) = &seed {
                        if known.is_same(reference.as_ref()) {
                            cycle = true;
                            return false;
                        }
                    } else {
                        seed = Some(reference.clone());
                    }
                }
                true
            },
            true,
        );
        if cycle {
            log::debug!("cycle detected in term '{}'", self);
        }
        cycle
    }

    // === Formula text ===

    /// Formula text using the given separators.
    pub fn to_locale_string(&self, separators: &Separators) -> String {
        let param = separators.parameter().to_string();
        let join = |terms: &[Term]| {
            terms
                .iter()
                .map(|term| term.to_locale_string(separators))
                .collect::<Vec<_>>()
                .join(&param)
        };
        let text = match &self.node {
            TermNode::Leaf(operand) => operand.to_locale_string(separators),
            TermNode::Unary { operator, operand } => {
                format!("{}{}", operator.symbol(), operand.to_locale_string(separators))
            }
            TermNode::Unit { operator, operand } => {
                format!("{}{}", operand.to_locale_string(separators), operator.symbol())
            }
            TermNode::Binary {
                operator,
                left,
                right,
            } => format!(
                "{}{}{}",
                left.to_locale_string(separators),
                operator.symbol(),
                right.to_locale_string(separators)
            ),
            TermNode::Condition {
                condition,
                on_true,
                on_false,
            } => format!(
                "?({}{param}{}{param}{})",
                condition.to_locale_string(separators),
                on_true.to_locale_string(separators),
                on_false.to_locale_string(separators)
            ),
            TermNode::Function(func) => format!("{}({})", func.name, join(&func.params)),
            TermNode::List(items) => format!("[{}]", join(items)),
            TermNode::Null => String::new(),
        };
        if self.use_brackets {
            format!("({text})")
        } else {
            text
        }
    }
}

fn params_equal(a: &[Term], b: &[Term]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.is_equal_to(b))
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_locale_string(&Separators::DEFAULT))
    }
}
