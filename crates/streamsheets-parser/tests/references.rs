//! Reference following, cycle detection and cell evaluation against an
//! in-memory grid.

mod common;

use common::{sum, Grid, GridContext};
use pretty_assertions::assert_eq;
use std::cell::Cell as Counter;
use std::rc::Rc;
use streamsheets_parser::{formula_fn, Parser, Reference, Value};

fn setup() -> (Rc<Grid>, GridContext) {
    let grid = Grid::new();
    let context = GridContext::new(&grid).with_function("SUM", sum());
    (grid, context)
}

#[test]
fn test_cells_read_referenced_values() {
    let (grid, context) = setup();
    grid.set(&context, "A1", "2").unwrap();
    grid.set(&context, "A2", "3").unwrap();
    let b1 = grid.set(&context, "B1", "=A1*A2 + 1").unwrap();
    assert_eq!(b1.value(), Value::Number(7.0));

    let total = grid.set(&context, "C1", "=SUM(A1:B1, 10)").unwrap();
    assert_eq!(total.value(), Value::Number(19.0));

    // cached until re-evaluated
    grid.set(&context, "A1", "5").unwrap();
    assert_eq!(b1.value(), Value::Number(7.0));
    grid.recalc(1);
    assert_eq!(b1.value(), Value::Number(16.0));
}

#[test]
fn test_direct_and_transitive_cycles() {
    let (grid, context) = setup();
    let a1 = grid.set(&context, "A1", "=B1").unwrap();
    let b1 = grid.set(&context, "B1", "=A1").unwrap();

    assert!(a1.term().as_ref().unwrap().has_cycle(None));
    assert!(b1.term().as_ref().unwrap().has_cycle(None));

    let (grid, context) = setup();
    grid.set(&context, "A1", "=B1+1").unwrap();
    grid.set(&context, "B1", "=C1*2").unwrap();
    let c1 = grid.set(&context, "C1", "=?(A1>0, A1, 0)").unwrap();
    assert!(c1.term().as_ref().unwrap().has_cycle(None));

    let self_ref = grid.set(&context, "D1", "=D1+1").unwrap();
    assert!(self_ref.term().as_ref().unwrap().has_cycle(None));
}

#[test]
fn test_no_cycle_in_chain() {
    let (grid, context) = setup();
    let a1 = grid.set(&context, "A1", "=B1").unwrap();
    grid.set(&context, "B1", "=5").unwrap();
    assert!(!a1.term().as_ref().unwrap().has_cycle(None));

    // the same cell twice is not a cycle
    let c1 = grid.set(&context, "C1", "=B1+B1").unwrap();
    let start = Parser::parse("C1", &context).unwrap();
    let start = start.operand().and_then(|op| op.as_reference()).unwrap();
    assert!(!c1.term().as_ref().unwrap().has_cycle(Some(start)));
}

#[test]
fn test_cycle_from_start_reference() {
    let (grid, context) = setup();
    grid.set(&context, "A1", "=B1").unwrap();
    let b1 = grid.set(&context, "B1", "=C1 + A1").unwrap();
    grid.set(&context, "C1", "=1").unwrap();

    let a1_term = Parser::parse("A1", &context).unwrap();
    let start = a1_term.operand().and_then(|op| op.as_reference()).cloned().unwrap();
    assert!(b1.term().as_ref().unwrap().has_cycle(Some(&start)));

    let a1 = grid.cell("A1").unwrap();
    assert!(a1.term().as_ref().unwrap().has_cycle(Some(&start)));

    let c1_term = Parser::parse("C1", &context).unwrap();
    let start = c1_term.operand().and_then(|op| op.as_reference()).cloned().unwrap();
    let c1 = grid.cell("C1").unwrap();
    assert!(!c1.term().as_ref().unwrap().has_cycle(Some(&start)));
}

#[test]
fn test_find_references() {
    let (grid, context) = setup();
    grid.set(&context, "A1", "=B1 + C1").unwrap();
    grid.set(&context, "B1", "=D1").unwrap();
    let e1 = grid.set(&context, "E1", "=A1 * A1 + SUM(B1)").unwrap();

    let names = |follow: bool| -> Vec<String> {
        e1.term()
            .as_ref()
            .unwrap()
            .find_references(follow)
            .iter()
            .map(|reference| reference.to_string())
            .collect()
    };
    assert_eq!(names(false), vec!["A1", "B1"]);
    // depth first through A1 into B1 before C1
    assert_eq!(names(true), vec!["A1", "B1", "D1", "C1"]);
    assert_eq!(e1.references(), vec!["A1".to_string(), "B1".to_string()]);
}

#[test]
fn test_traversal_terminates_on_cycles() {
    let (grid, context) = setup();
    grid.set(&context, "A1", "=B1 + 1").unwrap();
    let b1 = grid.set(&context, "B1", "=A1 + 1").unwrap();

    let mut visited = 0;
    let completed = b1.term().as_ref().unwrap().traverse(
        &mut |_| {
            visited += 1;
            true
        },
        true,
    );
    assert!(completed);
    assert!(visited > 0);
}

#[test]
fn test_unresolved_references() {
    let (grid, context) = setup();
    let cell = grid.set(&context, "A1", "=Z99").unwrap();
    assert_eq!(cell.value(), Value::Number(0.0));
    assert_eq!(cell.cell_value(), Value::Number(0.0));

    let term = Parser::parse("Z99", &context).unwrap();
    let reference = term.operand().and_then(|op| op.as_reference()).unwrap();
    assert!(!reference.is_resolved());
    assert!(term.is_unresolved_reference());

    // comparisons against an unresolved reference are false
    let compare = grid.set(&context, "A2", "=Z99 = 0").unwrap();
    assert_eq!(compare.value(), Value::Bool(false));

    // once the target exists the reference resolves
    grid.set(&context, "Z99", "4").unwrap();
    grid.recalc(1);
    assert_eq!(cell.value(), Value::Number(4.0));
    assert!(reference.is_resolved());
}

#[test]
fn test_removed_cells_dispose_their_terms() {
    let disposed = Rc::new(Counter::new(0));
    let flag = disposed.clone();
    let grid = Grid::new();
    let context = GridContext::new(&grid).with_function(
        "WATCH",
        formula_fn(move |call, _| {
            if let Some(context) = call.term_context() {
                if !context.has_dispose_listeners() {
                    let flag = flag.clone();
                    context.add_dispose_listener(move || flag.set(flag.get() + 1));
                }
            }
            Value::Number(1.0)
        }),
    );

    let cell = grid.set(&context, "A1", "=WATCH() + 1").unwrap();
    assert_eq!(cell.value(), Value::Number(2.0));
    cell.evaluate();
    assert_eq!(disposed.get(), 0);

    // replacing the term disposes the previous one
    grid.set(&context, "A1", "=WATCH()").unwrap();
    assert_eq!(disposed.get(), 1);

    grid.remove("A1");
    assert_eq!(disposed.get(), 2);
    assert!(cell.is_disposed());
    assert!(grid.cell("A1").is_none());
}
