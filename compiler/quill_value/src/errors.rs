//! Evaluation errors and the escalation channel.
//!
//! # Structured Error Categories
//!
//! `EvalErrorKind` carries typed error categories. Factory functions
//! (e.g. `no_entry_for_key()`) are the public API; they populate both
//! `kind` and `message`. The message texts are stable: error managers
//! match them with regular expressions.

use std::fmt;

use quill_ir::Pos;

use crate::Value;

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Field access
    NoEntryForKey {
        key: String,
    },
    NilDataNoEntry {
        key: String,
    },
    CantEvaluateField {
        field: String,
        type_name: String,
    },
    UnexportedField {
        field: String,
        type_name: String,
    },
    FieldHasArguments {
        field: String,
    },
    NilPointer {
        field: String,
    },

    // Calls
    FunctionNotDefined {
        name: String,
    },
    WrongArgCount {
        name: String,
        want: usize,
        got: usize,
        variadic: bool,
    },
    BadResultCount {
        name: String,
        count: usize,
    },
    NotAFunction {
        name: String,
    },
    CallFailed {
        name: String,
        cause: String,
    },
    Panicked {
        message: String,
    },

    // Argument typing
    ExpectedLiteral {
        expected: String,
        found: String,
    },
    WrongType {
        expected: String,
        got: String,
    },
    InvalidValue {
        expected: String,
    },
    CannotAssignNil {
        expected: String,
    },

    // Comparison and indexing
    IncompatibleComparison,
    InvalidComparison,
    IndexOutOfRange {
        index: i64,
    },
    CannotIndex {
        type_name: String,
    },

    // Structure
    UndefinedVariable {
        name: String,
    },
    UndefinedTemplate {
        name: String,
    },
    CannotRange {
        type_name: String,
    },
    FlowOutsideRange {
        keyword: &'static str,
    },
    DepthExceeded {
        depth: usize,
    },
    ExpansionTooDeep {
        field: String,
        depth: usize,
    },

    /// Catch-all for errors raised by user functions and handlers.
    Custom {
        message: String,
    },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEntryForKey { key } => write!(f, "map has no entry for key {key:?}"),
            Self::NilDataNoEntry { key } => write!(f, "nil data; no entry for key {key:?}"),
            Self::CantEvaluateField { field, type_name } => {
                write!(f, "can't evaluate field {field} in type {type_name}")
            }
            Self::UnexportedField { field, type_name } => {
                write!(f, "{field} is an unexported field of struct type {type_name}")
            }
            Self::FieldHasArguments { field } => {
                write!(f, "{field} has arguments but cannot be invoked as function")
            }
            Self::NilPointer { field } => {
                write!(f, "nil pointer evaluating interface {{}}.{field}")
            }

            Self::FunctionNotDefined { name } => write!(f, "function {name:?} not defined"),
            Self::WrongArgCount {
                name,
                want,
                got,
                variadic,
            } => {
                let at_least = if *variadic { "at least " } else { "" };
                write!(f, "wrong number of args for {name}: want {at_least}{want} got {got}")
            }
            Self::BadResultCount { name, count } => {
                write!(f, "can't call method/function {name:?} with {count} results")
            }
            Self::NotAFunction { name } => write!(f, "can't give argument to non-function {name}"),
            Self::CallFailed { name, cause } => write!(f, "error calling {name}: {cause}"),
            Self::Panicked { message } => f.write_str(message),

            Self::ExpectedLiteral { expected, found } => {
                write!(f, "expected {expected}; found {found}")
            }
            Self::WrongType { expected, got } => {
                write!(f, "wrong type for value; expected {expected}; got {got}")
            }
            Self::InvalidValue { expected } => write!(f, "invalid value; expected {expected}"),
            Self::CannotAssignNil { expected } => write!(f, "cannot assign nil to {expected}"),

            Self::IncompatibleComparison => write!(f, "incompatible types for comparison"),
            Self::InvalidComparison => write!(f, "invalid type for comparison"),
            Self::IndexOutOfRange { index } => write!(f, "index out of range: {index}"),
            Self::CannotIndex { type_name } => write!(f, "can't index item of type {type_name}"),

            Self::UndefinedVariable { name } => write!(f, "undefined variable: {name}"),
            Self::UndefinedTemplate { name } => write!(f, "template {name:?} not defined"),
            Self::CannotRange { type_name } => write!(f, "range can't iterate over {type_name}"),
            Self::FlowOutsideRange { keyword } => {
                write!(f, "{{{{{keyword}}}}} outside {{{{range}}}}")
            }
            Self::DepthExceeded { depth } => {
                write!(f, "exceeded maximum template depth ({depth})")
            }
            Self::ExpansionTooDeep { field, depth } => {
                write!(f, "array expansion of {field} nested deeper than {depth}")
            }

            Self::Custom { message } => f.write_str(message),
        }
    }
}

/// A recoverable evaluation failure.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    /// Structured error category.
    pub kind: EvalErrorKind,
    /// Human-readable message; equals `kind.to_string()` for factory errors.
    pub message: String,
    /// Position of the node that raised the error, once known.
    pub location: Option<Pos>,
}

impl EvalError {
    /// Create an error with just a message.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        EvalError {
            kind: EvalErrorKind::Custom {
                message: message.clone(),
            },
            message,
            location: None,
        }
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        EvalError {
            kind,
            message,
            location: None,
        }
    }

    /// Attach a position to this error.
    #[must_use]
    pub fn at(mut self, pos: Pos) -> Self {
        self.location = Some(pos);
        self
    }

    /// Attach a position unless one is already recorded.
    #[must_use]
    pub fn at_if_unset(self, pos: Pos) -> Self {
        if self.location.is_some() || pos.is_dummy() {
            self
        } else {
            self.at(pos)
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        EvalError::new(message)
    }
}

impl From<&str> for EvalError {
    fn from(message: &str) -> Self {
        EvalError::new(message)
    }
}

// Field access

#[cold]
pub fn no_entry_for_key(key: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoEntryForKey {
        key: key.to_string(),
    })
}

#[cold]
pub fn nil_data_no_entry(key: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilDataNoEntry {
        key: key.to_string(),
    })
}

#[cold]
pub fn cant_evaluate_field(field: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CantEvaluateField {
        field: field.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn unexported_field(field: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UnexportedField {
        field: field.to_string(),
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn field_has_arguments(field: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FieldHasArguments {
        field: field.to_string(),
    })
}

#[cold]
pub fn nil_pointer(field: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilPointer {
        field: field.to_string(),
    })
}

// Calls

#[cold]
pub fn function_not_defined(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FunctionNotDefined {
        name: name.to_string(),
    })
}

/// Arity mismatch. `variadic` renders the wanted count as a minimum.
#[cold]
pub fn wrong_arg_count(name: &str, want: usize, got: usize, variadic: bool) -> EvalError {
    EvalError::from_kind(EvalErrorKind::WrongArgCount {
        name: name.to_string(),
        want,
        got,
        variadic,
    })
}

#[cold]
pub fn bad_result_count(name: &str, count: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::BadResultCount {
        name: name.to_string(),
        count,
    })
}

#[cold]
pub fn not_a_function(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotAFunction {
        name: name.to_string(),
    })
}

/// Wrap an error returned by a user function.
#[cold]
pub fn call_failed(name: &str, cause: &EvalError) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CallFailed {
        name: name.to_string(),
        cause: cause.message.clone(),
    })
}

#[cold]
pub fn panicked(message: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::Panicked {
        message: message.to_string(),
    })
}

// Argument typing

/// A literal of the wrong syntactic kind, e.g. `expected integer; found "1"`.
#[cold]
pub fn expected_literal(expected: &str, found: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ExpectedLiteral {
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

#[cold]
pub fn wrong_type(expected: &str, got: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::WrongType {
        expected: expected.to_string(),
        got: got.to_string(),
    })
}

#[cold]
pub fn invalid_value(expected: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidValue {
        expected: expected.to_string(),
    })
}

#[cold]
pub fn cannot_assign_nil(expected: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CannotAssignNil {
        expected: expected.to_string(),
    })
}

// Comparison and indexing

#[cold]
pub fn incompatible_comparison() -> EvalError {
    EvalError::from_kind(EvalErrorKind::IncompatibleComparison)
}

#[cold]
pub fn invalid_comparison() -> EvalError {
    EvalError::from_kind(EvalErrorKind::InvalidComparison)
}

#[cold]
pub fn index_out_of_range(index: i64) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IndexOutOfRange { index })
}

#[cold]
pub fn cannot_index(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CannotIndex {
        type_name: type_name.to_string(),
    })
}

// Structure

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_template(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedTemplate {
        name: name.to_string(),
    })
}

#[cold]
pub fn cannot_range(type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CannotRange {
        type_name: type_name.to_string(),
    })
}

#[cold]
pub fn flow_outside_range(keyword: &'static str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FlowOutsideRange { keyword })
}

#[cold]
pub fn depth_exceeded(depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DepthExceeded { depth })
}

#[cold]
pub fn expansion_too_deep(field: &str, depth: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ExpansionTooDeep {
        field: field.to_string(),
        depth,
    })
}

/// Escalation channel for everything that interrupts normal evaluation.
///
/// Errors and flow-control signals travel the same `Err` path so `?`
/// unwinds through every layer, but they stay distinct variants: only
/// `Error` is ever offered to error managers.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlAction {
    /// A recoverable failure.
    Error(Box<EvalError>),
    /// `{{break}}`: stop the innermost range.
    Break,
    /// `{{continue}}`: advance the innermost range.
    Continue,
    /// `{{return ...}}`: unwind to the template invocation, which replaces its
    /// output with the rendered values.
    Return(Vec<Value>),
}

impl ControlAction {
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, ControlAction::Error(_))
    }

    /// Whether this is a break/continue/return signal.
    #[inline]
    pub fn is_flow(&self) -> bool {
        !self.is_error()
    }

    /// Convert to an error, turning stray loop signals into diagnostics.
    pub fn into_eval_error(self) -> EvalError {
        match self {
            ControlAction::Error(e) => *e,
            ControlAction::Break => flow_outside_range("break"),
            ControlAction::Continue => flow_outside_range("continue"),
            ControlAction::Return(_) => EvalError::new("return outside template"),
        }
    }

    /// Attach a position to the error variant; signals pass through.
    #[must_use]
    pub fn at_if_error(self, pos: Pos) -> Self {
        match self {
            ControlAction::Error(e) => ControlAction::Error(Box::new(e.at_if_unset(pos))),
            other => other,
        }
    }
}

impl From<EvalError> for ControlAction {
    fn from(err: EvalError) -> Self {
        ControlAction::Error(Box::new(err))
    }
}
