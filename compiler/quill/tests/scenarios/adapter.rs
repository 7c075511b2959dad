use pretty_assertions::assert_eq;
use proptest::prelude::*;
use quill::ir::Node;
use quill::{Callable, EvalError, Rest, Template, TreeBuilder, Value};

use crate::common::{render_err, template};

/// `{{name ARGS...}}` with integer literal arguments.
fn call_with_ints(name: &str, args: &[i64]) -> Template {
    let mut b = TreeBuilder::new("t");
    let mut cmd = vec![b.ident(name)];
    cmd.extend(args.iter().map(|&n| b.int(n)));
    let root = vec![b.action(cmd)];
    template(b.finish(root), [])
}

fn fixed_sum(arity: usize) -> Callable {
    match arity {
        0 => Callable::new(|| 0_i64),
        1 => Callable::new(|a: i64| a),
        2 => Callable::new(|a: i64, b: i64| a + b),
        3 => Callable::new(|a: i64, b: i64, c: i64| a + b + c),
        _ => Callable::new(|a: i64, b: i64, c: i64, d: i64| a + b + c + d),
    }
}

proptest! {
    #[test]
    fn exact_arity_never_fails(args in prop::collection::vec(-1000_i64..1000, 0..=4)) {
        let mut t = call_with_ints("sum", &args);
        t.funcs([("sum", fixed_sum(args.len()))]);
        let expected: i64 = args.iter().sum();
        prop_assert_eq!(t.execute(Value::Nil).unwrap(), expected.to_string());
    }

    #[test]
    fn variadic_accepts_any_count(args in prop::collection::vec(-1000_i64..1000, 0..8)) {
        let mut t = call_with_ints("sum", &args);
        t.func("sum", |xs: Rest<i64>| xs.0.iter().sum::<i64>());
        let expected: i64 = args.iter().sum();
        prop_assert_eq!(t.execute(Value::Nil).unwrap(), expected.to_string());
    }
}

#[test]
fn missing_fixed_argument_before_variadic_tail() {
    let mut t = call_with_ints("join", &[]);
    t.func("join", |sep: String, parts: Rest<String>| parts.0.join(&sep));
    assert!(render_err(&t, Value::Nil).ends_with("wrong number of args for join: want at least 1 got 0"));
}

#[test]
fn float_parameters_accept_integer_literals() {
    let mut t = call_with_ints("half", &[3]);
    t.func("half", |x: f64| x / 2.0);
    assert_eq!(t.execute(Value::Nil).unwrap(), "1.5");
}

#[test]
fn result_shapes_normalise() {
    let mut b = TreeBuilder::new("t");
    let names = ["nothing", "ok_only", "pair", "value_ok"];
    let mut root = Vec::new();
    for name in names {
        let f = b.ident(name);
        root.push(Node::text("("));
        root.push(b.action([f]));
        root.push(Node::text(")"));
    }
    let mut t = template(b.finish(root), []);
    t.extra_funcs([
        ("nothing", Callable::new(|| ())),
        ("ok_only", Callable::new(|| -> Result<(), EvalError> { Ok(()) })),
        ("pair", Callable::new(|| ("a", 1_i64))),
        ("value_ok", Callable::new(|| -> Result<&'static str, EvalError> { Ok("v") })),
    ])
    .unwrap();
    assert_eq!(t.execute(Value::Nil).unwrap(), "()()([a 1])(v)");
}

#[test]
fn value_and_error_pair_reports_the_error() {
    let mut t = call_with_ints("check", &[-1]);
    t.func("check", |n: i64| -> Result<i64, EvalError> {
        if n < 0 {
            return Err(EvalError::new(format!("negative: {n}")));
        }
        Ok(n)
    });
    assert_eq!(
        render_err(&t, Value::Nil),
        r#"template: t:1:1: executing "t" at <check>: error calling check: negative: -1"#
    );
}

#[test]
fn variadic_values_keep_their_types() {
    let mut b = TreeBuilder::new("t");
    let kinds = b.ident("kinds");
    let one = b.int(1);
    let s = b.string("s");
    let yes = b.bool(true);
    let dot = b.dot();
    let root = vec![b.action([kinds, one, s, yes, dot])];
    let mut t = template(b.finish(root), []);
    t.func("kinds", |xs: Rest<Value>| {
        xs.0.iter().map(|x| x.kind().to_string()).collect::<Vec<_>>().join(",")
    });
    assert_eq!(t.execute(Value::list([1_i64])).unwrap(), "int,string,bool,slice");
}
