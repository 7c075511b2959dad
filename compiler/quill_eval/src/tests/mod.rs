//! Recovery-loop and option scenarios driven through whole templates.

use quill_ir::{Branch, Node, Pipeline, Pos, Tree, TreeBuilder};
use quill_value::{ControlAction, EvalError, MapValue, StructValue, Value};

use crate::{group, Callable, ContextSource, ErrorAction, ErrorManager, Options, Template};

fn template(tree: Tree) -> Template {
    let mut t = Template::new(tree.name.clone());
    t.add_tree(tree);
    t
}

fn replace_with(text: &'static str) -> ErrorManager {
    ErrorManager::new(move |_| Ok((Value::string(text), ErrorAction::ResultReplaced)))
}

/// `{{name}}` calling a function with no arguments.
fn call_template(name: &str) -> Template {
    let mut b = TreeBuilder::new("t");
    let f = b.ident(name);
    let root = vec![b.action([f])];
    template(b.finish(root))
}

/// `{{.path}}`.
fn field_template(path: &str) -> Template {
    let mut b = TreeBuilder::new("t");
    let f = b.field(path);
    let root = vec![b.action([f])];
    template(b.finish(root))
}

mod recovery {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_registry_leaves_failure_unchanged() {
        let mut t = call_template("nope");
        let before = t.execute(Value::Nil).unwrap_err().to_string();
        t.error_managers("gone", vec![replace_with("x")]);
        t.error_managers("gone", Vec::new());
        assert!(t.registry().is_empty());
        assert_eq!(t.execute(Value::Nil).unwrap_err().to_string(), before);
    }

    #[test]
    fn groups_run_in_name_order_whatever_the_registration_order() {
        let mut forward = call_template("nope");
        forward.error_managers("a", vec![replace_with("A")]);
        forward.error_managers("b", vec![replace_with("B")]);

        let mut backward = call_template("nope");
        backward.error_managers("b", vec![replace_with("B")]);
        backward.error_managers("a", vec![replace_with("A")]);

        assert_eq!(forward.execute(Value::Nil).unwrap(), "A");
        assert_eq!(backward.execute(Value::Nil).unwrap(), "A");
        for _ in 0..3 {
            assert_eq!(backward.execute(Value::Nil).unwrap(), "A");
        }
    }

    #[test]
    fn managers_within_a_group_run_in_order() {
        let mut t = call_template("nope");
        let decline = ErrorManager::new(|_| Ok((Value::Invalid, ErrorAction::NoReplace)));
        t.error_managers("g", vec![decline, replace_with("second"), replace_with("third")]);
        assert_eq!(t.execute(Value::Nil).unwrap(), "second");
    }

    #[test]
    fn handler_error_replaces_failure_for_later_managers() {
        let mut t = call_template("nope");
        let reject = ErrorManager::new(|_| Err(EvalError::new("first says no").into()))
            .on_sources(ContextSource::CALL);
        let accept = replace_with("ok").filters(&["^first says no$"]).unwrap();
        t.error_managers("a", vec![reject]);
        t.error_managers("b", vec![accept]);
        assert_eq!(t.execute(Value::Nil).unwrap(), "ok");

        t.error_managers("b", Vec::new());
        let err = t.execute(Value::Nil).unwrap_err().to_string();
        assert!(err.ends_with(": first says no"), "{err}");
    }

    #[test]
    fn result_as_array_reapplies_member_to_each_element() {
        let mut t = field_template(".People.Name");
        let manager = ErrorManager::new(|ctx| match ctx.receiver() {
            Value::List(_) => Ok((ctx.receiver().clone(), ErrorAction::ResultAsArray)),
            _ => Ok((Value::Invalid, ErrorAction::NoReplace)),
        })
        .on_sources(ContextSource::FIELD)
        .filters(&[r"can't evaluate field \w+ in type \[\]"])
        .unwrap();
        t.error_managers("array", vec![manager]);

        let people = Value::list([
            StructValue::new("Person").field("Name", "Ann"),
            StructValue::new("Person").field("Name", "Bob"),
        ]);
        let data = MapValue::new().with("People", people);
        assert_eq!(t.execute(data).unwrap(), "[Ann Bob]");
    }

    #[test]
    fn flow_signal_from_handler_is_not_swallowed() {
        let mut b = TreeBuilder::new("t");
        let items = b.dot();
        let stop = b.field(".Stop");
        let dot = b.dot();
        let body = vec![b.action([stop]), b.action([dot])];
        let root = vec![Node::Range(Branch::new(b.cmd([items]), body))];
        let mut t = template(b.finish(root));
        let manager = ErrorManager::new(|ctx| {
            if ctx.receiver() == &Value::Int(2) {
                return Err(ControlAction::Break);
            }
            Ok((Value::string(""), ErrorAction::ResultReplaced))
        })
        .on_members(["Stop"]);
        t.error_managers("stop", vec![manager]);
        assert_eq!(t.execute(Value::list([1_i64, 2, 3])).unwrap(), "1");
    }

    #[test]
    fn cloned_template_has_its_own_registry() {
        let original = call_template("nope");
        let mut copy = original.clone();
        copy.error_managers("x", vec![replace_with("recovered")]);
        assert_eq!(copy.execute(Value::Nil).unwrap(), "recovered");
        assert!(original.execute(Value::Nil).is_err());
        assert!(original.registered_groups().is_empty());
    }
}

mod options {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn all_options_install_groups_and_functions() {
        let mut t = Template::new("t");
        t.option(Options::ALL).unwrap();
        assert_eq!(
            t.registered_groups(),
            vec![
                group::FUNCS_AS_METHODS,
                group::PUBLIC_FUNCS,
                group::NON_STANDARD_RESULTS,
                group::CALL_FAIL,
            ]
        );
        assert_eq!(t.func_names(), vec!["break", "continue", "return", "trap"]);
        assert_eq!(t.options(), Options::ALL);
        assert_eq!(t.builtins().len(), 13);
    }

    #[test]
    fn user_groups_run_after_reserved_ones() {
        let mut t = Template::new("t");
        t.error_managers("mine", vec![replace_with("x")]);
        t.option(Options::TRAP).unwrap();
        assert_eq!(t.registered_groups(), vec![group::CALL_FAIL, "mine"]);
    }

    #[test]
    fn functions_as_methods() {
        let mut b = TreeBuilder::new("t");
        let index = b.field(".List.index");
        let one = b.int(1);
        let root = vec![b.action([index, one])];
        let mut t = template(b.finish(root));
        let data = MapValue::new().with("List", Value::list(["a", "b"]));
        assert!(t.execute(data.clone()).is_err());

        t.option(Options::FUNCTIONS_AS_METHODS).unwrap();
        assert_eq!(t.execute(data).unwrap(), "b");
    }

    #[test]
    fn public_functions() {
        let mut b = TreeBuilder::new("t");
        let upper_call = b.ident("Upper");
        let x = b.string("x");
        let abc = b.string("abc");
        let upper_field = b.field(".Upper");
        let root = vec![
            b.action([upper_call, x]),
            Node::text(" "),
            Node::With(Branch::new(b.cmd([abc]), vec![b.action([upper_field])])),
        ];
        let mut t = template(b.finish(root));
        t.func("upper", |s: String| s.to_uppercase());
        assert!(t.execute(Value::Nil).is_err());

        t.option(Options::PUBLIC_FUNCTIONS).unwrap();
        assert_eq!(t.execute(Value::Nil).unwrap(), "X ABC");
    }

    #[test]
    fn extra_funcs_accept_non_standard_results() {
        let mut b = TreeBuilder::new("t");
        let three = b.ident("three");
        let nothing = b.ident("nothing");
        let root = vec![b.action([three]), Node::text("|"), b.action([nothing]), Node::text("|")];
        let mut t = template(b.finish(root));
        t.extra_funcs([
            ("three", Callable::new(|| (1_i64, 2_i64, 3_i64))),
            ("nothing", Callable::new(|| ())),
        ])
        .unwrap();
        assert!(t.options().contains(Options::NON_STANDARD_RESULTS));
        assert_eq!(t.execute(Value::Nil).unwrap(), "[1 2 3]||");
    }

    #[test]
    fn extra_funcs_with_standard_results_leave_options_alone() {
        let mut t = Template::new("t");
        t.extra_funcs([("one", Callable::new(|| 1_i64))]).unwrap();
        assert_eq!(t.options(), Options::empty());
    }

    #[test]
    fn error_only_result_propagates_unwrapped() {
        let mut t = call_template("check");
        t.extra_funcs([(
            "check",
            Callable::new(|| -> Result<(), EvalError> { Err(EvalError::new("check failed")) }),
        )])
        .unwrap();
        let err = t.execute(Value::Nil).unwrap_err().to_string();
        assert_eq!(err, r#"template: t:1:1: executing "t" at <check>: check failed"#);
    }

    #[test]
    fn trap_turns_failures_into_values() {
        let mut b = TreeBuilder::new("t");
        let trap = b.ident("trap");
        let fail = b.ident("fail");
        let nested = b.pipe(Pipeline::call(Pos::DUMMY, [fail]));
        let error = b.var("$error");
        let root = vec![
            Node::text("Error: "),
            b.action([trap, nested]),
            Node::text(" / "),
            b.action([error]),
        ];
        let mut t = template(b.finish(root));
        t.func("fail", || -> Result<i64, EvalError> { Err(EvalError::new("bad")) });
        t.option(Options::TRAP).unwrap();
        assert_eq!(t.execute(Value::Nil).unwrap(), "Error: bad / bad");
    }

    #[test]
    fn trap_passes_successful_arguments_through() {
        let mut b = TreeBuilder::new("t");
        let trap = b.ident("trap");
        let one = b.int(1);
        let two = b.int(2);
        let root = vec![b.action([trap, one, two])];
        let mut t = template(b.finish(root));
        t.option(Options::TRAP).unwrap();
        assert_eq!(t.execute(Value::Nil).unwrap(), "[1 2]");
    }

    #[test]
    fn untrapped_failures_still_fail() {
        let mut t = call_template("fail");
        t.func("fail", || -> Result<i64, EvalError> { Err(EvalError::new("bad")) });
        t.option(Options::TRAP).unwrap();
        let err = t.execute(Value::Nil).unwrap_err().to_string();
        assert!(err.ends_with("error calling fail: bad"), "{err}");
    }
}

#[test]
fn template_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Template>();
    assert_send_sync::<ErrorManager>();
    assert_send_sync::<Callable>();
}
