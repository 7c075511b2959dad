use pretty_assertions::assert_eq;
use quill::ir::{Node, Pipeline};
use quill::{
    group, Callable, ContextSource, ErrorAction, ErrorManager, EvalError, Kind, MapValue,
    MissingMode, Options, Pos, TreeBuilder, Value,
};

use crate::common::{render_err, template};

#[test]
fn zero_value_mode_with_default_manager() {
    let mut b = TreeBuilder::new("t");
    let wanted = b.field(".default");
    let other = b.field(".other");
    let root = vec![b.action([wanted]), Node::text(" "), b.action([other])];
    let mut t = template(b.finish(root), []);
    t.missing_key(MissingMode::ZERO_VALUE);
    assert_eq!(t.execute(MapValue::typed(Kind::Int)).unwrap(), "0 0");

    let manager = ErrorManager::new(|_| Ok((Value::string("fallback"), ErrorAction::ResultReplaced)))
        .on_members(["default"])
        .filters(&["no entry for key"])
        .unwrap();
    t.error_managers("defaults", vec![manager]);
    assert_eq!(t.execute(MapValue::typed(Kind::Int)).unwrap(), "fallback 0");
}

#[test]
fn error_mode_failure_can_be_recovered_only_in_that_mode() {
    let mut b = TreeBuilder::new("t");
    let missing = b.field(".missing");
    let root = vec![b.action([missing])];
    let mut t = template(b.finish(root), []);
    let manager = ErrorManager::new(|ctx| {
        let text = format!("<{}>", ctx.member_name());
        Ok((Value::string(text), ErrorAction::ResultReplaced))
    })
    .on_sources(ContextSource::FIELD)
    .on_modes(MissingMode::ERROR);
    t.error_managers("strict", vec![manager]);

    assert_eq!(t.execute(MapValue::new()).unwrap(), "<no value>");
    t.missing_key(MissingMode::ERROR);
    assert_eq!(t.execute(MapValue::new()).unwrap(), "<missing>");

    t.error_managers("strict", Vec::new());
    assert_eq!(
        render_err(&t, MapValue::new()),
        r#"template: t:1:1: executing "t" at <.missing>: map has no entry for key "missing""#
    );
}

#[test]
fn three_values_and_an_error_propagate_the_error() {
    let mut b = TreeBuilder::new("t");
    let triple = b.ident("triple");
    let fail = b.field(".Fail");
    let root = vec![b.action([triple, fail])];
    let mut t = template(b.finish(root), []);
    t.extra_funcs([(
        "triple",
        Callable::new(|fail: bool| -> Result<(i64, i64, i64), EvalError> {
            if fail {
                return Err(EvalError::new("forced failure"));
            }
            Ok((1, 2, 3))
        }),
    )])
    .unwrap();

    assert_eq!(t.execute(MapValue::new().with("Fail", false)).unwrap(), "[1 2 3]");
    assert_eq!(
        render_err(&t, MapValue::new().with("Fail", true)),
        r#"template: t:1:1: executing "t" at <triple>: forced failure"#
    );
}

#[test]
fn trap_captures_host_panics() {
    let mut b = TreeBuilder::new("t");
    let trap = b.ident("trap");
    let explode = b.ident("explode");
    let nested = b.pipe(Pipeline::call(Pos::DUMMY, [explode]));
    let root = vec![Node::text("Error: "), b.action([trap, nested])];
    let mut t = template(b.finish(root), []);
    t.func("explode", || -> Value { panic!("boom!") });
    t.option(Options::TRAP).unwrap();
    assert_eq!(t.execute(Value::Nil).unwrap(), "Error: boom!");
}

#[test]
fn removing_the_call_fail_group_keeps_the_wrapped_text() {
    let mut b = TreeBuilder::new("t");
    let trap = b.ident("trap");
    let fail = b.ident("fail");
    let nested = b.pipe(Pipeline::call(Pos::DUMMY, [fail]));
    let root = vec![b.action([trap, nested])];
    let mut t = template(b.finish(root), []);
    t.func("fail", || -> Result<Value, EvalError> { Err(EvalError::new("bad")) });
    t.option(Options::ALL).unwrap();
    t.error_managers("zz-user", vec![ErrorManager::new(|_| Ok((Value::Invalid, ErrorAction::NoReplace)))]);
    assert_eq!(t.execute(Value::Nil).unwrap(), "bad");

    t.error_managers(group::CALL_FAIL, Vec::new());
    assert_eq!(
        t.registered_groups(),
        vec![group::FUNCS_AS_METHODS, group::PUBLIC_FUNCS, group::NON_STANDARD_RESULTS, "zz-user"]
    );
    assert_eq!(t.execute(Value::Nil).unwrap(), "error calling fail: bad");
}

#[test]
fn functions_as_methods_with_piped_value() {
    let mut b = TreeBuilder::new("t");
    let one = b.int(1);
    let index = b.field(".List.index");
    let pipe = b.cmd([one]).pipe([index]);
    let root = vec![Node::Action(pipe)];
    let mut t = template(b.finish(root), []);
    t.option(Options::FUNCTIONS_AS_METHODS).unwrap();
    let data = MapValue::new().with("List", Value::list(["a", "b"]));
    assert_eq!(t.execute(data).unwrap(), "b");
}

#[test]
fn unrecovered_failure_keeps_original_text() {
    let mut b = TreeBuilder::new("t");
    b.at(3, 7);
    let absent = b.field(".Absent");
    let root = vec![b.action([absent])];
    let mut t = template(b.finish(root), []);
    t.option(Options::ALL).unwrap();
    assert_eq!(
        render_err(&t, quill::StructValue::new("Thing")),
        r#"template: t:3:7: executing "t" at <.Absent>: can't evaluate field Absent in type Thing"#
    );
}

#[test]
fn recursion_depth_is_bounded() {
    let mut b = TreeBuilder::new("loop");
    let invoke = Node::Template {
        pos: b.pos(),
        name: "loop".to_string(),
        pipe: None,
    };
    let t = template(b.finish(vec![invoke]), []);
    let err = render_err(&t, Value::Nil);
    assert!(
        err.ends_with(&format!("exceeded maximum template depth ({})", quill::MAX_TEMPLATE_DEPTH)),
        "{err}"
    );
}
