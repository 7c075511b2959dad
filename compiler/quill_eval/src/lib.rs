//! Quill Eval - executor and error-recovery core for the Quill template engine.
//!
//! # Architecture
//!
//! - `Template`: configuration (trees, functions, methods, managers, options)
//!   and the `execute` entry points
//! - `Executor` (private): tree walker holding per-render output, variable
//!   scope and call stack
//! - `Context`: created at every fallible site (field lookup, call, print);
//!   offered to the error managers before a failure escalates
//! - `ErrorManager` / `ManagerRegistry`: declarative recovery rules in named,
//!   name-ordered groups
//! - `Callable`: the dynamic invocation adapter; typed closures are wrapped
//!   once at registration, arguments are evaluated lazily per call
//! - Flow control: `break`, `continue` and `return` travel as
//!   `ControlAction` variants, never as errors
//!
//! # Re-exports
//!
//! Value and error types from `quill_value`, syntax types from `quill_ir`.

mod builtins;
mod call_stack;
mod callable;
mod context;
mod environment;
mod exec;
mod handlers;
mod manager;
mod options;
mod output;
mod stack;
mod template;

pub use quill_ir::{NodeRef, Pos, Tree, TreeBuilder};
pub use quill_value::{
    ControlAction, EvalError, EvalErrorKind, EvalResult, Kind, MapValue, ParamType, StructValue,
    Value,
};

pub use call_stack::{CallFrame, CallStack};
pub use callable::{
    normalize, ArgSlot, Callable, FromArg, IntoCallable, IntoReturns, IntoValue, Rest, ResultType,
    Ret, Signature,
};
pub use context::{Context, MAX_EXPANSION_DEPTH};
pub use environment::{AssignError, Environment, Mark};
pub use exec::MAX_TEMPLATE_DEPTH;
pub use manager::{ErrorAction, ErrorManager, HandlerResult, ManagerRegistry};
pub use options::{group, ContextSource, MissingMode, Options};
pub use output::{BufferSink, OutputBuffer};
pub use stack::ensure_sufficient_stack;
pub use template::{ExecError, Template, TemplateError};

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
