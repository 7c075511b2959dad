use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use quill::ir::{Branch, Node};
use quill::{ErrorAction, ErrorManager, Options, Template, Tree, TreeBuilder, Value};

use crate::common::{numbers, render_err, template};

/// `{{range .}}{{.}}-{{if eq . STOP}}{{KEYWORD}}{{end}}{{end}}`
fn print_then_signal(name: &str, keyword: &str, stop: i64) -> Tree {
    let mut b = TreeBuilder::new(name);
    let items = b.dot();
    let item = b.dot();
    let eq = b.ident("eq");
    let current = b.dot();
    let limit = b.int(stop);
    let signal = b.ident(keyword);
    let check = Node::If(Branch::new(b.cmd([eq, current, limit]), vec![b.action([signal])]));
    let body = vec![b.action([item]), Node::text("-"), check];
    let root = vec![Node::Range(Branch::new(b.cmd([items]), body))];
    b.finish(root)
}

/// `{{range .}}{{if eq . STOP}}{{KEYWORD}}{{end}}{{.}}-{{end}}`
fn signal_then_print(name: &str, keyword: &str, stop: i64) -> Tree {
    let mut b = TreeBuilder::new(name);
    let items = b.dot();
    let eq = b.ident("eq");
    let current = b.dot();
    let limit = b.int(stop);
    let signal = b.ident(keyword);
    let item = b.dot();
    let check = Node::If(Branch::new(b.cmd([eq, current, limit]), vec![b.action([signal])]));
    let body = vec![check, b.action([item]), Node::text("-")];
    let root = vec![Node::Range(Branch::new(b.cmd([items]), body))];
    b.finish(root)
}

fn flow_template(main: Tree, others: impl IntoIterator<Item = Tree>) -> Template {
    let mut t = template(main, others);
    t.option(Options::FLOW_CONTROL).unwrap();
    t
}

#[test]
fn break_stops_the_loop() {
    let t = flow_template(print_then_signal("t", "break", 5), []);
    assert!(t.registered_groups().is_empty());
    assert_eq!(t.execute(numbers(1..=10)).unwrap(), "1-2-3-4-5-");
}

#[test]
fn continue_skips_the_rest_of_the_iteration() {
    let t = flow_template(signal_then_print("t", "continue", 3), []);
    assert_eq!(t.execute(numbers(1..=5)).unwrap(), "1-2-4-5-");
}

#[test]
fn break_leaves_only_the_innermost_range() {
    let mut b = TreeBuilder::new("t");
    let rows = b.dot();
    let row = b.dot();
    let eq = b.ident("eq");
    let current = b.dot();
    let two = b.int(2);
    let brk = b.ident("break");
    let cell = b.dot();
    let check = Node::If(Branch::new(b.cmd([eq, current, two]), vec![b.action([brk])]));
    let inner = Node::Range(Branch::new(b.cmd([row]), vec![check, b.action([cell])]));
    let root = vec![Node::Range(Branch::new(
        b.cmd([rows]),
        vec![Node::text("["), inner, Node::text("]")],
    ))];
    let t = flow_template(b.finish(root), []);
    let data = Value::List(vec![numbers(1..=3), numbers(1..=3)]);
    assert_eq!(t.execute(data).unwrap(), "[1][1]");
}

#[test]
fn bare_return_keeps_invocation_output() {
    let list = signal_then_print("list", "return", 7);
    let mut b = TreeBuilder::new("t");
    let dot = b.dot();
    let invoke = Node::Template {
        pos: b.pos(),
        name: "list".to_string(),
        pipe: Some(b.cmd([dot])),
    };
    let root = vec![Node::text("List: "), invoke, Node::text("!")];
    let t = flow_template(b.finish(root), [list]);
    assert_eq!(t.execute(numbers(1..=10)).unwrap(), "List: 1-2-3-4-5-6-!");
}

#[test]
fn return_values_replace_invocation_output() {
    let mut pair = TreeBuilder::new("pair");
    let ret = pair.ident("return");
    let one = pair.int(1);
    let two = pair.int(2);
    let root = vec![Node::text("discarded "), pair.action([ret, one, two]), Node::text("unreached")];
    let pair = pair.finish(root);

    let mut b = TreeBuilder::new("t");
    let invoke = Node::Template {
        pos: b.pos(),
        name: "pair".to_string(),
        pipe: None,
    };
    let root = vec![Node::text("<"), invoke, Node::text(">")];
    let t = flow_template(b.finish(root), [pair]);
    assert_eq!(t.execute(Value::Nil).unwrap(), "<[1 2]>");
}

#[test]
fn top_level_return_replaces_everything() {
    let mut b = TreeBuilder::new("t");
    let ret = b.ident("return");
    let value = b.string("only this");
    let root = vec![Node::text("before "), b.action([ret, value]), Node::text(" after")];
    let t = flow_template(b.finish(root), []);
    assert_eq!(t.execute(Value::Nil).unwrap(), "only this");
}

#[test]
fn break_outside_range_is_an_error() {
    let mut b = TreeBuilder::new("t");
    let brk = b.ident("break");
    let root = vec![b.action([brk])];
    let t = flow_template(b.finish(root), []);
    assert_eq!(render_err(&t, Value::Nil), "template: t: {{break}} outside {{range}}");
}

#[test]
fn catch_all_manager_never_sees_signals() {
    let consulted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&consulted);
    let catch_all = ErrorManager::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok((Value::string("caught"), ErrorAction::ResultReplaced))
    })
    .filters(&[".*"])
    .unwrap();

    let mut t = flow_template(print_then_signal("t", "break", 5), []);
    t.error_managers("catch-all", vec![catch_all.clone()]);
    assert_eq!(t.execute(numbers(1..=10)).unwrap(), "1-2-3-4-5-");

    let mut t = flow_template(signal_then_print("t", "continue", 2), []);
    t.error_managers("catch-all", vec![catch_all]);
    assert_eq!(t.execute(numbers(1..=3)).unwrap(), "1-3-");

    assert_eq!(consulted.load(Ordering::SeqCst), 0);
}

#[test]
fn return_arguments_are_evaluated_in_place() {
    let mut b = TreeBuilder::new("t");
    let ret = b.ident("return");
    let name = b.field(".Name");
    let root = vec![b.action([ret, name])];
    let t = flow_template(b.finish(root), []);
    let data = quill::MapValue::new().with("Name", "returned");
    assert_eq!(t.execute(data).unwrap(), "returned");
}
