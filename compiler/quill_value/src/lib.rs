//! Quill Value - runtime data model for the Quill template engine.
//!
//! - [`Value`] and friends: what templates are executed against.
//! - [`EvalError`] / [`EvalErrorKind`]: recoverable failures, built through
//!   the `#[cold]` factory functions in [`errors`].
//! - [`ControlAction`]: the escalation channel shared by errors and the
//!   break/continue/return signals.
//! - [`ParamType`]: declared parameter types used for argument coercion.

pub mod errors;
mod param;
mod value;

pub use errors::{ControlAction, EvalError, EvalErrorKind};
pub use param::ParamType;
pub use value::{is_exported, Kind, MapValue, StructValue, Value};

/// Result of evaluating a single step.
pub type EvalResult = Result<Value, ControlAction>;
