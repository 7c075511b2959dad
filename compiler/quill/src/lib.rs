//! Quill: Go-style text templates whose failures can be recovered by
//! programmable error managers.
//!
//! This crate is the public surface. The executor and recovery engine live
//! in `quill_eval`, the data model in `quill_value` and the syntax tree in
//! `quill_ir`; their public items are re-exported here.
//!
//! # Example
//!
//! ```
//! use quill::{ErrorAction, ErrorManager, MapValue, Template, TreeBuilder, Value};
//!
//! let mut b = TreeBuilder::new("greet");
//! let name = b.field(".Name");
//! let root = vec![b.action([name])];
//! let tree = b.finish(root);
//!
//! let mut t = Template::new("greet");
//! t.add_tree(tree);
//! t.error_managers(
//!     "fallback",
//!     vec![ErrorManager::new(|_| Ok((Value::string("stranger"), ErrorAction::ResultReplaced)))
//!         .filters(&["no entry for key"])
//!         .unwrap()],
//! );
//! assert_eq!(t.execute(MapValue::new()).unwrap(), "stranger");
//! ```
//!
//! # Debugging
//!
//! Call [`init_tracing`] and set `RUST_LOG`, e.g. `RUST_LOG=quill_eval=debug`
//! to see which manager claimed each failure, or `trace` for every call the
//! adapter makes.

use std::sync::Once;

pub use quill_eval::{
    ensure_sufficient_stack, group, normalize, ArgSlot, AssignError, BufferSink, CallFrame,
    CallStack, Callable, Context, ContextSource, ControlAction, Environment, ErrorAction,
    ErrorManager, EvalError, EvalErrorKind, EvalResult, ExecError, FromArg, HandlerResult,
    IntoCallable, IntoReturns, IntoValue, Kind, ManagerRegistry, MapValue, Mark, MissingMode,
    NodeRef, Options, OutputBuffer, ParamType, Pos, Rest, ResultType, Ret, Signature, StructValue,
    Template, TemplateError, Tree, TreeBuilder, Value, MAX_EXPANSION_DEPTH, MAX_TEMPLATE_DEPTH,
};

/// Syntax tree types for building templates programmatically.
pub mod ir {
    pub use quill_ir::*;
}

/// Error factories whose texts the built-in manager filters match.
pub mod errors {
    pub use quill_value::errors::*;
}

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
