use std::sync::Arc;
use std::thread;

use quill::{ErrorAction, ErrorManager, MapValue, Options, Template, TreeBuilder, Value};

use crate::common::template;

fn shared_template() -> Template {
    let mut b = TreeBuilder::new("t");
    let name = b.field(".Name");
    let upper = b.ident("upper");
    let nick = b.field(".Nick");
    let root = vec![b.action([name]), quill::ir::Node::text(":"), b.action([upper, nick])];
    let mut t = template(b.finish(root), []);
    t.func("upper", |s: String| s.to_uppercase());
    t.option(Options::ALL).unwrap();
    t.error_managers(
        "nick",
        vec![ErrorManager::new(|ctx| {
            let fallback = match ctx.global() {
                Value::Map(m) => m.get("Name").map(ToString::to_string).unwrap_or_default(),
                _ => String::new(),
            };
            Ok((Value::string(fallback), ErrorAction::ResultReplaced))
        })
        .on_members(["Nick"])
        .filters(&["no entry for key"])
        .unwrap()],
    );
    t
}

#[test]
fn renders_from_many_threads() {
    let t = Arc::new(shared_template());
    thread::scope(|scope| {
        for worker in 0..8 {
            let t = Arc::clone(&t);
            scope.spawn(move || {
                for i in 0..50 {
                    let name = format!("w{worker}-{i}");
                    let mut data = MapValue::new().with("Name", name.clone());
                    if i % 2 == 0 {
                        data.insert("Nick", "nick");
                        assert_eq!(t.execute(data).unwrap(), format!("{name}:NICK"));
                    } else {
                        assert_eq!(t.execute(data).unwrap(), format!("{name}:{}", name.to_uppercase()));
                    }
                }
            });
        }
    });
}

#[test]
fn configuration_is_isolated_between_clones() {
    let base = shared_template();
    let mut strict = base.clone();
    strict.error_managers("nick", Vec::new());

    let data = MapValue::new().with("Name", "n");
    assert_eq!(base.execute(data.clone()).unwrap(), "n:N");
    // Without the manager the missing key yields `<no value>`, which is not a
    // string argument.
    assert!(strict.execute(data).is_err());
    assert_eq!(base.registered_groups().len(), strict.registered_groups().len() + 1);
}
