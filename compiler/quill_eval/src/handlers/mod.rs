//! Manager sets and functions installed by [`crate::Options`].

use quill_value::{ControlAction, EvalError, ParamType, Value};

use crate::callable::Callable;
use crate::manager::{ErrorAction, ErrorManager, HandlerResult};
use crate::options::ContextSource;
use crate::Context;

fn decline() -> HandlerResult {
    Ok((Value::Invalid, ErrorAction::NoReplace))
}

/// Retry the captured `function` with the receiver as first argument.
fn call_matched(ctx: &mut Context<'_, '_>, name: &str) -> HandlerResult {
    match ctx.try_call(name)? {
        Some(value) if ctx.error().is_none() => Ok((value, ErrorAction::ResultReplaced)),
        _ => decline(),
    }
}

/// `$x.fn args` becomes `fn $x args`.
pub(crate) fn functions_as_methods() -> Result<Vec<ErrorManager>, regex::Error> {
    let manager = ErrorManager::new(|ctx| {
        let name = ctx.matched("function").to_string();
        call_matched(ctx, &name)
    })
    .on_sources(ContextSource::FIELD)
    .filters(&[r"can't evaluate field (?P<function>\S+) in type (?P<receiver>.*)"])?;
    Ok(vec![manager])
}

/// `.Fn` and `Fn` fall back to function `fn`.
pub(crate) fn public_functions() -> Result<Vec<ErrorManager>, regex::Error> {
    let manager = ErrorManager::new(|ctx| {
        let name = lower_first(ctx.matched("function"));
        call_matched(ctx, &name)
    })
    .on_sources(ContextSource::FIELD | ContextSource::CALL)
    .filters(&[
        r"can't evaluate field (?P<function>[[:upper:]]\w*) in type",
        r#"map has no entry for key "(?P<function>[[:upper:]]\w*)""#,
        r#"function "(?P<function>[[:upper:]]\w*)" not defined"#,
    ])?;
    Ok(vec![manager])
}

fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Calls rejected for their result shape are re-run through the adapter,
/// which accepts any shape. Returned errors stay unwrapped.
pub(crate) fn non_standard_results() -> Result<Vec<ErrorManager>, regex::Error> {
    let manager = ErrorManager::new(|ctx| {
        let value = ctx.call(None)?;
        if ctx.error().is_some() {
            return decline();
        }
        Ok((value, ErrorAction::ResultReplaced))
    })
    .on_sources(ContextSource::CALL)
    .filters(&[r#"can't call method/function "(?P<function>\S+)" with \d+ results"#])?;
    Ok(vec![manager])
}

/// Failures of calls made directly under `trap` become error values.
pub(crate) fn call_fail() -> Result<Vec<ErrorManager>, regex::Error> {
    let manager = ErrorManager::new(|ctx| {
        if !ctx.trapped() {
            return decline();
        }
        let error = EvalError::new(ctx.matched("error"));
        ctx.clear_error();
        Ok((Value::error(error), ErrorAction::ResultReplaced))
    })
    .on_sources(ContextSource::CALL)
    .filters(&[
        r"(?s)^error calling (?P<function>\S+): (?P<error>.+)$",
        r"(?s)(?P<error>.+)",
    ])?;
    Ok(vec![manager])
}

/// `trap ARGS...`: the first failing argument becomes an error value,
/// also bound to `$error`; otherwise the arguments themselves.
pub(crate) fn trap() -> Callable {
    Callable::with_context(|ctx| {
        let count = ctx.arg_count();
        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let value = match ctx.eval_arg(i, ParamType::Any) {
                Ok(value) => value,
                Err(ControlAction::Error(err)) => Value::error(*err),
                Err(flow) => return Err(flow),
            };
            if matches!(value, Value::Error(_)) {
                tracing::debug!(error = %value, "trapped");
                ctx.bind("$error", value.clone());
                return Ok(value);
            }
            values.push(value);
        }
        Ok(Value::collapse(values))
    })
}

/// `break`, `continue` and `return ARGS...`.
pub(crate) fn flow_control() -> [(&'static str, Callable); 3] {
    [
        ("break", Callable::with_context(|_| Err(ControlAction::Break))),
        ("continue", Callable::with_context(|_| Err(ControlAction::Continue))),
        (
            "return",
            Callable::with_context(|ctx| Err(ControlAction::Return(ctx.eval_args()?))),
        ),
    ]
}
