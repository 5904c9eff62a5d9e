//! Function bindings: the function table, call contexts and term contexts

use crate::term::Term;
use crate::value::Value;
use ahash::AHashMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Function implementation signature
///
/// Functions receive their parameters as unevaluated terms, so they decide
/// themselves which parameters to evaluate and how often.
pub type FormulaFunction = Rc<dyn Fn(&CallContext<'_>, &[Term]) -> Value>;

/// Wrap a closure as a [`FormulaFunction`].
pub fn formula_fn<F>(f: F) -> FormulaFunction
where
    F: Fn(&CallContext<'_>, &[Term]) -> Value + 'static,
{
    Rc::new(f)
}

/// Per-call information handed to a function
pub struct CallContext<'a> {
    /// Name as written in the formula
    pub name: &'a str,
    /// The call-site term, e.g. to reach its [`TermContext`]
    pub term: &'a Term,
    /// Execution scope bound by the parser context (typically the sheet)
    pub scope: Option<&'a dyn Any>,
}

impl<'a> CallContext<'a> {
    /// Context of the call-site term
    pub fn term_context(&self) -> Option<&'a TermContext> {
        self.term.term_context()
    }

    /// Downcast the scope
    pub fn scope<T: Any>(&self) -> Option<&'a T> {
        self.scope.and_then(|scope| scope.downcast_ref::<T>())
    }
}

/// Case-insensitive function registry
#[derive(Clone, Default)]
pub struct FunctionTable {
    functions: AHashMap<String, FormulaFunction>,
}

impl FunctionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<FormulaFunction> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Register a function, replacing any previous binding
    pub fn set(&mut self, name: &str, function: FormulaFunction) {
        self.functions.insert(name.to_uppercase(), function);
    }

    pub fn remove(&mut self, name: &str) -> Option<FormulaFunction> {
        self.functions.remove(&name.to_uppercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("functions", &self.names())
            .finish()
    }
}

/// State owned by a function term.
///
/// Functions use it to stash per-call-site state (an aggregator, a request
/// id) and to register cleanup that runs when the term is dropped or
/// explicitly disposed.
#[derive(Default)]
pub struct TermContext {
    dispose_listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
    state: RefCell<Option<Box<dyn Any>>>,
    display: RefCell<Option<Value>>,
}

impl TermContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `listener` once when this context is disposed.
    pub fn add_dispose_listener(&self, listener: impl FnOnce() + 'static) {
        self.dispose_listeners.borrow_mut().push(Box::new(listener));
    }

    pub fn has_dispose_listeners(&self) -> bool {
        !self.dispose_listeners.borrow().is_empty()
    }

    /// Replace the stashed state
    pub fn set_state<T: Any>(&self, state: T) {
        *self.state.borrow_mut() = Some(Box::new(state));
    }

    /// Run `f` on the stashed state if it has type `T`.
    pub fn with_state<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut();
        state
            .as_mut()
            .and_then(|boxed| boxed.downcast_mut::<T>())
            .map(f)
    }

    /// Run `f` on the stashed state, creating it with `init` first if needed.
    pub fn with_state_or_insert<T: Any, R>(
        &self,
        init: impl FnOnce() -> T,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        let mut state = self.state.borrow_mut();
        let mut typed: Box<T> = match state.take() {
            Some(boxed) => boxed.downcast::<T>().unwrap_or_else(|_| Box::new(init())),
            None => Box::new(init()),
        };
        let result = f(&mut typed);
        *state = Some(typed);
        result
    }

    pub fn clear_state(&self) {
        self.state.borrow_mut().take();
    }

    /// Value shown instead of the computed one, see [`Term::cell_value`].
    pub fn set_display(&self, display: Option<Value>) {
        *self.display.borrow_mut() = display;
    }

    pub fn display(&self) -> Option<Value> {
        self.display.borrow().clone()
    }

    /// Run and drop all dispose listeners. Safe to call more than once.
    pub fn dispose(&self) {
        let listeners = std::mem::take(&mut *self.dispose_listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
        self.clear_state();
    }
}

impl Drop for TermContext {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for TermContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TermContext")
            .field("listeners", &self.dispose_listeners.borrow().len())
            .field("has_state", &self.state.borrow().is_some())
            .field("display", &self.display.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_function_table_is_case_insensitive() {
        let mut table = FunctionTable::new();
        table.set("sum", formula_fn(|_, _| Value::Number(0.0)));
        assert!(table.has("SUM"));
        assert!(table.get("Sum").is_some());
        assert_eq!(table.names(), vec!["SUM"]);
        assert!(table.remove("SUM").is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn test_dispose_listeners_run_once() {
        let calls = Rc::new(Cell::new(0));
        let context = TermContext::new();
        let counter = calls.clone();
        context.add_dispose_listener(move || counter.set(counter.get() + 1));
        context.dispose();
        context.dispose();
        drop(context);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_state_slot() {
        let context = TermContext::new();
        assert_eq!(context.with_state(|n: &mut u32| *n), None);
        let total = context.with_state_or_insert(|| 10u32, |n| {
            *n += 1;
            *n
        });
        assert_eq!(total, 11);
        assert_eq!(context.with_state(|n: &mut u32| *n), Some(11));
        context.clear_state();
        assert_eq!(context.with_state(|n: &mut u32| *n), None);
    }
}
