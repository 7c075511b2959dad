//! Built-in template functions.
//!
//! `and`/`or` are context-only so they can evaluate their arguments lazily
//! and short-circuit; the rest are plain typed closures.

use std::cmp::Ordering;

use quill_value::errors::{
    cannot_index, incompatible_comparison, index_out_of_range, invalid_comparison, wrong_arg_count,
};
use quill_value::{ControlAction, EvalError, ParamType, Value};
use rustc_hash::FxHashMap;

use crate::callable::{Callable, Rest};
use crate::Context;

/// Every built-in, keyed by name.
pub(crate) fn builtins() -> FxHashMap<String, Callable> {
    let mut funcs = FxHashMap::default();
    let mut add = |name: &str, callable: Callable| {
        funcs.insert(name.to_string(), callable);
    };

    add("and", Callable::with_context(|ctx| short_circuit(ctx, "and", false)));
    add("or", Callable::with_context(|ctx| short_circuit(ctx, "or", true)));
    add("not", Callable::new(|v: Value| !v.is_truthy()));
    add("len", Callable::new(length));
    add("index", Callable::new(index));
    add("print", Callable::new(|args: Rest<Value>| sprint(&args.0)));
    add("println", Callable::new(|args: Rest<Value>| sprintln(&args.0)));
    add("eq", Callable::new(eq));
    add("ne", Callable::new(|a: Value, b: Value| -> Result<bool, EvalError> {
        equal(&a, &b).map(|eq| !eq)
    }));
    add("lt", Callable::new(|a: Value, b: Value| compare(&a, &b).map(Ordering::is_lt)));
    add("le", Callable::new(|a: Value, b: Value| compare(&a, &b).map(Ordering::is_le)));
    add("gt", Callable::new(|a: Value, b: Value| compare(&a, &b).map(Ordering::is_gt)));
    add("ge", Callable::new(|a: Value, b: Value| compare(&a, &b).map(Ordering::is_ge)));
    funcs
}

/// `and` stops at the first falsy argument, `or` at the first truthy one;
/// otherwise the last argument is the result.
fn short_circuit(ctx: &mut Context<'_, '_>, name: &str, stop_on: bool) -> Result<Value, ControlAction> {
    let count = ctx.arg_count();
    if count == 0 {
        return Err(wrong_arg_count(name, 1, 0, true).into());
    }
    let mut last = Value::Invalid;
    for i in 0..count {
        last = ctx.eval_arg(i, ParamType::Any)?;
        if last.is_truthy() == stop_on {
            break;
        }
    }
    Ok(last)
}

fn length(item: Value) -> Result<i64, EvalError> {
    let len = match &item {
        Value::Str(s) => s.len(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => return Err(EvalError::new(format!("len of type {}", other.type_name()))),
    };
    i64::try_from(len).map_err(|_| EvalError::new("len overflows int"))
}

fn index(item: Value, indices: Rest<Value>) -> Result<Value, EvalError> {
    let mut item = item;
    for key in indices.0 {
        item = match (&item, &key) {
            (Value::List(items), Value::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| index_out_of_range(*i))?,
            (Value::Map(map), Value::Str(k)) => {
                map.get(k).cloned().unwrap_or_else(|| map.zero_entry())
            }
            (Value::Invalid | Value::Nil, _) => return Err(EvalError::new("index of untyped nil")),
            (Value::List(_) | Value::Map(_), key) => {
                return Err(EvalError::new(format!(
                    "cannot index {} with {}",
                    item.type_name(),
                    key.type_name()
                )))
            }
            (other, _) => return Err(cannot_index(&other.type_name())),
        };
    }
    Ok(item)
}

/// Operands are separated by a space when neither side is a string.
fn sprint(args: &[Value]) -> String {
    let mut out = String::new();
    for (i, arg) in args.iter().enumerate() {
        let is_str = matches!(arg, Value::Str(_));
        if i > 0 && !is_str && !matches!(args[i - 1], Value::Str(_)) {
            out.push(' ');
        }
        out.push_str(&arg.to_string());
    }
    out
}

fn sprintln(args: &[Value]) -> String {
    let mut out = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    out.push('\n');
    out
}

/// `eq a b c...` is true when `a` equals any of the others.
fn eq(a: Value, rest: Rest<Value>) -> Result<bool, EvalError> {
    if rest.0.is_empty() {
        return Err(EvalError::new("missing argument for comparison"));
    }
    for b in &rest.0 {
        if equal(&a, b)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn equal(a: &Value, b: &Value) -> Result<bool, EvalError> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        #[allow(clippy::float_cmp, reason = "template equality is exact")]
        (Value::Float(x), Value::Float(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        (Value::Nil | Value::Invalid, Value::Nil | Value::Invalid) => Ok(true),
        (Value::Nil | Value::Invalid, _) | (_, Value::Nil | Value::Invalid) => Ok(false),
        (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => {
            Err(EvalError::new(format!(
                "non-comparable type {}: {}",
                a,
                a.type_name()
            )))
        }
        (Value::Struct(x), Value::Struct(y)) => Ok(x == y),
        (Value::Error(x), Value::Error(y)) => Ok(x == y),
        _ => Err(incompatible_comparison()),
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).ok_or_else(invalid_comparison),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::Float(_) | Value::Str(_), Value::Int(_) | Value::Float(_) | Value::Str(_)) => {
            Err(incompatible_comparison())
        }
        _ => Err(invalid_comparison()),
    }
}
