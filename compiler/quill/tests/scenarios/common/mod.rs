//! Shared builders for scenario tests.

use quill::{Template, Tree, Value};

/// A template whose own tree is `main`, with `others` available to
/// `{{template}}`.
pub fn template(main: Tree, others: impl IntoIterator<Item = Tree>) -> Template {
    quill::init_tracing();
    let mut t = Template::new(main.name.clone());
    t.add_tree(main);
    for tree in others {
        t.add_tree(tree);
    }
    t
}

/// A list of the integers in `range`.
pub fn numbers(range: std::ops::RangeInclusive<i64>) -> Value {
    Value::List(range.map(Value::Int).collect())
}

/// Render and return the error text, failing if the render succeeded.
pub fn render_err(t: &Template, data: impl Into<Value>) -> String {
    match t.execute(data) {
        Ok(out) => panic!("expected a render failure, got {out:?}"),
        Err(err) => err.to_string(),
    }
}
