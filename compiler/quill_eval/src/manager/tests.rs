use std::collections::BTreeSet;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use quill_ir::{Tree, TreeBuilder};
use quill_value::{Kind, MapValue, StructValue, Value};

use super::*;
use crate::Template;

fn decline() -> ErrorManager {
    ErrorManager::new(|_| Ok((Value::Invalid, ErrorAction::NoReplace)))
}

fn replace_with(text: &'static str) -> ErrorManager {
    ErrorManager::new(move |_| Ok((Value::string(text), ErrorAction::ResultReplaced)))
}

fn template(tree: Tree) -> Template {
    let mut t = Template::new(tree.name.clone());
    t.add_tree(tree);
    t
}

/// `{{.Field}}` on a template named `t`.
fn field_template(path: &str) -> Template {
    let mut b = TreeBuilder::new("t");
    let field = b.field(path);
    let root = vec![b.action([field])];
    template(b.finish(root))
}

#[test]
fn registry_orders_groups_by_name() {
    let mut registry = ManagerRegistry::new();
    registry.register("user", vec![decline()]);
    registry.register("Zero", vec![decline(), decline()]);
    registry.register("_funcs", vec![decline()]);
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["Zero", "_funcs", "user"]);
    assert_eq!(registry.iter().count(), 4);
    assert_eq!(registry.len(), 3);
}

#[test]
fn empty_registration_removes_group() {
    let mut registry = ManagerRegistry::new();
    registry.register("a", vec![decline()]);
    registry.register("a", Vec::new());
    assert!(!registry.contains("a"));
    assert!(registry.is_empty());

    registry.register("never", Vec::new());
    assert!(registry.is_empty());
}

#[test]
fn re_registration_replaces_group() {
    let mut registry = ManagerRegistry::new();
    registry.register("a", vec![decline(), decline()]);
    registry.register("a", vec![decline()]);
    assert_eq!(registry.iter().count(), 1);
}

#[test]
fn invalid_filter_is_reported() {
    assert!(decline().filters(&["(unclosed"]).is_err());
}

#[test]
fn debug_lists_criteria() {
    let manager = decline()
        .on_sources(ContextSource::FIELD)
        .on_members(["Name"])
        .filters(&["no entry"])
        .unwrap();
    let text = format!("{manager:?}");
    assert!(text.contains("members: [\"Name\"]"), "{text}");
    assert!(text.contains("filters: [\"no entry\"]"), "{text}");
}

#[test]
fn error_action_names() {
    assert_eq!(ErrorAction::NoReplace.to_string(), "NoReplace");
    assert_eq!(ErrorAction::ResultReplaced.to_string(), "ResultReplaced");
    assert_eq!(ErrorAction::ResultAsArray.to_string(), "ResultAsArray");
}

#[test]
fn source_mask_must_intersect() {
    let mut t = field_template(".missing");
    t.missing_key(MissingMode::ERROR);
    t.error_managers("call-only", vec![replace_with("call").on_sources(ContextSource::CALL)]);
    assert!(t.execute(MapValue::new()).is_err());

    t.error_managers("field", vec![replace_with("field").on_sources(ContextSource::FIELD | ContextSource::CALL)]);
    assert_eq!(t.execute(MapValue::new()).unwrap(), "field");
}

#[test]
fn mode_mask_must_intersect() {
    let mut t = field_template(".missing");
    t.error_managers(
        "zero",
        vec![replace_with("zero").on_sources(ContextSource::FIELD).on_modes(MissingMode::ZERO_VALUE)],
    );
    assert_eq!(t.execute(MapValue::new()).unwrap(), "<no value>");
    t.missing_key(MissingMode::ZERO_VALUE);
    assert_eq!(t.execute(MapValue::new()).unwrap(), "zero");
}

#[test]
fn member_names_are_exact() {
    let mut t = field_template(".Missing");
    t.error_managers("name", vec![replace_with("named").on_members(["missing", "Other"])]);
    assert_eq!(t.execute(MapValue::new()).unwrap(), "<no value>");
    t.error_managers("name", vec![replace_with("named").on_members(["Missing"])]);
    assert_eq!(t.execute(MapValue::new()).unwrap(), "named");
}

#[test]
fn receiver_kind_must_be_listed() {
    let mut t = field_template(".Absent");
    t.error_managers("kind", vec![replace_with("map only").on_kinds([Kind::Map])]);
    assert!(t.execute(StructValue::new("T")).is_err());
    assert_eq!(t.execute(MapValue::new()).unwrap(), "map only");
}

#[test]
fn filters_require_a_failure() {
    let mut t = field_template(".Name");
    t.error_managers(
        "any",
        vec![replace_with("caught").filters(&[".*"]).unwrap()],
    );
    assert_eq!(t.execute(MapValue::new().with("Name", "n")).unwrap(), "n");
    assert_eq!(t.execute(MapValue::new()).unwrap(), "caught");
}

#[test]
fn first_matching_filter_supplies_captures() {
    let mut t = field_template(".Absent");
    let manager = ErrorManager::new(|ctx| {
        let text = format!("{}/{}", ctx.matched("1"), ctx.matched("type"));
        Ok((Value::string(text), ErrorAction::ResultReplaced))
    })
    .filters(&[
        r"no such thing (\w+)",
        r"can't evaluate field (\w+) in type (?P<type>\w+)",
        r"(?P<type>.*)",
    ])
    .unwrap();
    t.error_managers("captures", vec![manager]);
    assert_eq!(t.execute(StructValue::new("Thing")).unwrap(), "Absent/Thing");
}

#[test]
fn unmatched_filters_leave_failure() {
    let mut t = field_template(".Absent");
    t.error_managers("miss", vec![replace_with("x").filters(&["^nothing like this$"]).unwrap()]);
    let err = t.execute(StructValue::new("T")).unwrap_err().to_string();
    assert!(err.ends_with("can't evaluate field Absent in type T"), "{err}");
}

proptest! {
    #[test]
    fn registry_names_are_sorted_and_unique(
        ops in prop::collection::vec(("[a-dA-D_]{1,3}", 0usize..3), 0..24),
    ) {
        let mut registry = ManagerRegistry::new();
        let mut model = BTreeSet::new();
        for (name, count) in &ops {
            registry.register(name.as_str(), (0..*count).map(|_| decline()).collect());
            if *count == 0 {
                model.remove(name);
            } else {
                model.insert(name.clone());
            }
        }
        let names: Vec<String> = registry.names().map(str::to_string).collect();
        let expected: Vec<String> = model.into_iter().collect();
        prop_assert_eq!(names, expected);
    }
}
