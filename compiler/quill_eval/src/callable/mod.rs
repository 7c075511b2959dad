//! Callable descriptors and typed adapters.
//!
//! Every function or method a template can call is a [`Callable`]: a
//! [`Signature`] describing its parameters and results plus a type-erased
//! body. Plain Rust closures become callables through [`IntoCallable`];
//! the parameter and return types of the closure determine the signature.
//!
//! ```text
//! |a: i64, b: i64| a + b                      -> (int, int) -> value
//! |s: String| -> Result<String, EvalError>    -> (string) -> (value, error)
//! |xs: Rest<i64>| xs.0.len()                   -> (...int) -> value
//! ```
//!
//! Functions that need the evaluation context are built with
//! [`Callable::contextual`] or [`Callable::with_context`]; their first
//! declared parameter is [`ParamType::Context`].

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use quill_value::errors::{panicked, wrong_type};
use quill_value::{ControlAction, EvalError, MapValue, ParamType, StructValue, Value};

use crate::Context;

/// Declared kind of one result slot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ResultType {
    Value,
    Error,
}

/// Declared shape of a callable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<ParamType>,
    /// The last parameter absorbs any number of trailing arguments.
    pub variadic: bool,
    pub results: Vec<ResultType>,
}

impl Signature {
    pub fn new(params: Vec<ParamType>, results: Vec<ResultType>) -> Self {
        Signature {
            params,
            variadic: false,
            results,
        }
    }

    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.variadic = !self.params.is_empty();
        self
    }

    /// Whether the first parameter is the evaluation context.
    pub fn takes_context(&self) -> bool {
        self.params.first() == Some(&ParamType::Context)
    }

    /// One value, optionally followed by an error.
    pub fn is_standard(&self) -> bool {
        matches!(
            self.results.as_slice(),
            [ResultType::Value] | [ResultType::Value, ResultType::Error]
        )
    }

    /// Declared type of argument slot `index`, folding variadic overflow
    /// onto the element type.
    pub fn param_at(&self, index: usize) -> Option<ParamType> {
        match self.params.get(index) {
            Some(ty) => Some(*ty),
            None if self.variadic => self.params.last().copied(),
            None => None,
        }
    }

    /// Number of parameters that must always be supplied.
    pub fn fixed_len(&self) -> usize {
        if self.variadic {
            self.params.len().saturating_sub(1)
        } else {
            self.params.len()
        }
    }
}

/// One returned slot.
#[derive(Clone, Debug, PartialEq)]
pub enum Ret {
    Value(Value),
    /// An error-typed slot; `None` when the call succeeded.
    Error(Option<EvalError>),
}

impl Ret {
    pub fn value(value: impl Into<Value>) -> Self {
        Ret::Value(value.into())
    }
}

/// Split a trailing error slot off and collapse the remaining values.
///
/// No values become `""`, one stays as is and several become a list.
pub fn normalize(mut rets: Vec<Ret>) -> (Value, Option<EvalError>) {
    let error = if matches!(rets.last(), Some(Ret::Error(_))) {
        match rets.pop() {
            Some(Ret::Error(e)) => e,
            _ => None,
        }
    } else {
        None
    };
    let values = rets
        .into_iter()
        .map(|ret| match ret {
            Ret::Value(v) => v,
            Ret::Error(e) => e.map_or(Value::Nil, Value::error),
        })
        .collect();
    (Value::collapse(values), error)
}

type PlainBody = dyn Fn(Vec<Value>) -> Result<Vec<Ret>, EvalError> + Send + Sync;
type ContextBody =
    dyn for<'e, 't> Fn(&mut Context<'e, 't>, Vec<Value>) -> Result<Vec<Ret>, ControlAction>
        + Send
        + Sync;

#[derive(Clone)]
enum Body {
    Plain(Arc<PlainBody>),
    Contextual(Arc<ContextBody>),
}

/// A function or method invocable from a template.
///
/// Cheap to clone; templates and their clones share callables.
#[derive(Clone)]
pub struct Callable {
    signature: Arc<Signature>,
    body: Body,
}

impl Callable {
    /// Adapt a typed Rust closure.
    pub fn new<M>(f: impl IntoCallable<M>) -> Self {
        f.into_callable()
    }

    /// Build a callable from a declared signature and a dynamic body.
    ///
    /// The body receives one value per parameter, already coerced to the
    /// declared types.
    pub fn from_fn<F>(signature: Signature, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Vec<Ret>, EvalError> + Send + Sync + 'static,
    {
        Callable {
            signature: Arc::new(signature),
            body: Body::Plain(Arc::new(f)),
        }
    }

    /// Build a callable whose body receives the evaluation context.
    ///
    /// A leading [`ParamType::Context`] is added to `signature` if missing.
    pub fn contextual<F>(mut signature: Signature, f: F) -> Self
    where
        F: for<'e, 't> Fn(&mut Context<'e, 't>, Vec<Value>) -> Result<Vec<Ret>, ControlAction>
            + Send
            + Sync
            + 'static,
    {
        if !signature.takes_context() {
            signature.params.insert(0, ParamType::Context);
        }
        Callable {
            signature: Arc::new(signature),
            body: Body::Contextual(Arc::new(f)),
        }
    }

    /// A context-only function returning one value.
    ///
    /// Context-only functions are exempt from arity checks and read their
    /// arguments through [`Context::eval_arg`] or [`Context::eval_args`].
    pub fn with_context<F>(f: F) -> Self
    where
        F: for<'e, 't> Fn(&mut Context<'e, 't>) -> Result<Value, ControlAction>
            + Send
            + Sync
            + 'static,
    {
        Self::contextual(
            Signature::new(vec![ParamType::Context], vec![ResultType::Value]),
            move |ctx, _| f(ctx).map(|v| vec![Ret::Value(v)]),
        )
    }

    pub fn signature(&self) -> &Arc<Signature> {
        &self.signature
    }

    pub fn is_contextual(&self) -> bool {
        matches!(self.body, Body::Contextual(_))
    }

    /// Run the body. Panics in plain bodies become returned errors.
    pub(crate) fn invoke(
        &self,
        ctx: &mut Context<'_, '_>,
        args: Vec<Value>,
    ) -> Result<Vec<Ret>, ControlAction> {
        match &self.body {
            Body::Plain(f) => Ok(call_plain(f, args)),
            Body::Contextual(f) => (**f)(ctx, args),
        }
    }

    /// Run a plain body without a context.
    ///
    /// Contextual callables cannot run detached and report an error.
    pub fn call_detached(&self, args: Vec<Value>) -> Vec<Ret> {
        match &self.body {
            Body::Plain(f) => call_plain(f, args),
            Body::Contextual(_) => vec![Ret::Error(Some(wrong_type(
                ParamType::Context.name(),
                "<nil>",
            )))],
        }
    }
}

fn call_plain(f: &Arc<PlainBody>, args: Vec<Value>) -> Vec<Ret> {
    match catch_unwind(AssertUnwindSafe(move || (**f)(args))) {
        Ok(Ok(rets)) => rets,
        Ok(Err(err)) => vec![Ret::Error(Some(err))],
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::debug!(%message, "callable panicked");
            vec![Ret::Error(Some(panicked(&message)))]
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("signature", &self.signature)
            .field("contextual", &self.is_contextual())
            .finish()
    }
}

// Typed adapters

/// Extract one parameter from the coerced argument list.
pub trait ArgSlot: Sized {
    /// Whether this slot absorbs all remaining arguments.
    const VARIADIC: bool = false;

    fn param_type() -> ParamType;

    fn take(args: &mut std::vec::IntoIter<Value>) -> Result<Self, EvalError>;
}

/// A concrete argument type, usable on its own or as a [`Rest`] element.
pub trait FromArg: Sized {
    fn param_type() -> ParamType;

    fn from_value(value: Value) -> Option<Self>;
}

/// Trailing variadic arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rest<T>(pub Vec<T>);

fn convert<T: FromArg>(value: Value) -> Result<T, EvalError> {
    let type_name = value.type_name();
    T::from_value(value).ok_or_else(|| wrong_type(T::param_type().name(), &type_name))
}

impl<T: FromArg> ArgSlot for Rest<T> {
    const VARIADIC: bool = true;

    fn param_type() -> ParamType {
        T::param_type()
    }

    fn take(args: &mut std::vec::IntoIter<Value>) -> Result<Self, EvalError> {
        args.map(convert::<T>).collect::<Result<Vec<T>, _>>().map(Rest)
    }
}

macro_rules! impl_arg {
    ($ty:ty, $param:expr, |$v:ident| $extract:expr) => {
        impl FromArg for $ty {
            fn param_type() -> ParamType {
                $param
            }

            fn from_value($v: Value) -> Option<Self> {
                $extract
            }
        }

        impl ArgSlot for $ty {
            fn param_type() -> ParamType {
                $param
            }

            fn take(args: &mut std::vec::IntoIter<Value>) -> Result<Self, EvalError> {
                convert(args.next().unwrap_or_default())
            }
        }
    };
}

impl_arg!(Value, ParamType::Any, |v| Some(v));
impl_arg!(i64, ParamType::Int, |v| v.as_int());
impl_arg!(bool, ParamType::Bool, |v| match v {
    Value::Bool(b) => Some(b),
    _ => None,
});
impl_arg!(String, ParamType::Str, |v| match v {
    Value::Str(s) => Some(s),
    _ => None,
});
impl_arg!(Vec<Value>, ParamType::List, |v| match v {
    Value::List(items) => Some(items),
    _ => None,
});
impl_arg!(MapValue, ParamType::Map, |v| match v {
    Value::Map(m) => Some(m),
    _ => None,
});
impl_arg!(f64, ParamType::Float, |v| match v {
    Value::Float(x) => Some(x),
    Value::Int(n) => Some(widen(n)),
    _ => None,
});

#[allow(clippy::cast_precision_loss, reason = "integers widen to float64 arguments")]
fn widen(n: i64) -> f64 {
    n as f64
}

/// Conversion of a single returned Rust value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

macro_rules! impl_into_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

impl_into_value!(Value, String, &'static str, i64, i32, usize, bool, f64, Vec<Value>, MapValue, StructValue);

/// Conversion of a closure's return into result slots.
pub trait IntoReturns {
    fn result_types() -> Vec<ResultType>;

    fn into_rets(self) -> Vec<Ret>;
}

impl IntoReturns for () {
    fn result_types() -> Vec<ResultType> {
        Vec::new()
    }

    fn into_rets(self) -> Vec<Ret> {
        Vec::new()
    }
}

impl IntoReturns for Result<(), EvalError> {
    fn result_types() -> Vec<ResultType> {
        vec![ResultType::Error]
    }

    fn into_rets(self) -> Vec<Ret> {
        vec![Ret::Error(self.err())]
    }
}

macro_rules! impl_returns_single {
    ($($ty:ty),*) => {
        $(
            impl IntoReturns for $ty {
                fn result_types() -> Vec<ResultType> {
                    vec![ResultType::Value]
                }

                fn into_rets(self) -> Vec<Ret> {
                    vec![Ret::Value(self.into_value())]
                }
            }

            impl IntoReturns for Result<$ty, EvalError> {
                fn result_types() -> Vec<ResultType> {
                    vec![ResultType::Value, ResultType::Error]
                }

                fn into_rets(self) -> Vec<Ret> {
                    match self {
                        Ok(v) => vec![Ret::Value(v.into_value()), Ret::Error(None)],
                        Err(e) => vec![Ret::Value(Value::Invalid), Ret::Error(Some(e))],
                    }
                }
            }
        )*
    };
}

impl_returns_single!(Value, String, &'static str, i64, i32, usize, bool, f64, Vec<Value>, MapValue, StructValue);

macro_rules! impl_returns_tuple {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoReturns for ($($name,)+) {
            fn result_types() -> Vec<ResultType> {
                vec![$(impl_returns_tuple!(@value $name)),+]
            }

            #[allow(non_snake_case)]
            fn into_rets(self) -> Vec<Ret> {
                let ($($name,)+) = self;
                vec![$(Ret::Value($name.into_value())),+]
            }
        }

        impl<$($name: IntoValue),+> IntoReturns for Result<($($name,)+), EvalError> {
            fn result_types() -> Vec<ResultType> {
                let mut types = vec![$(impl_returns_tuple!(@value $name)),+];
                types.push(ResultType::Error);
                types
            }

            #[allow(non_snake_case)]
            fn into_rets(self) -> Vec<Ret> {
                match self {
                    Ok(($($name,)+)) => vec![$(Ret::Value($name.into_value())),+, Ret::Error(None)],
                    Err(e) => {
                        let mut rets = vec![$(impl_returns_tuple!(@nil $name)),+];
                        rets.push(Ret::Error(Some(e)));
                        rets
                    }
                }
            }
        }
    };
    (@value $name:ident) => { ResultType::Value };
    (@nil $name:ident) => { Ret::Value(Value::Nil) };
}

impl_returns_tuple!(A, B);
impl_returns_tuple!(A, B, C);

/// Conversion of a typed closure into a [`Callable`].
///
/// `Marker` is the closure's `fn` pointer type; it only disambiguates the
/// per-arity implementations.
pub trait IntoCallable<Marker> {
    fn into_callable(self) -> Callable;
}

impl IntoCallable<()> for Callable {
    fn into_callable(self) -> Callable {
        self
    }
}

macro_rules! impl_into_callable {
    ($($arg:ident),*) => {
        impl<F, R, $($arg),*> IntoCallable<fn($($arg),*) -> R> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReturns,
            $($arg: ArgSlot,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn into_callable(self) -> Callable {
                let slots: &[(ParamType, bool)] = &[$(($arg::param_type(), $arg::VARIADIC)),*];
                let signature = Signature {
                    params: slots.iter().map(|(ty, _)| *ty).collect(),
                    variadic: slots.last().is_some_and(|(_, rest)| *rest),
                    results: R::result_types(),
                };
                Callable::from_fn(signature, move |args: Vec<Value>| {
                    let mut args = args.into_iter();
                    $(let $arg = $arg::take(&mut args)?;)*
                    Ok((self)($($arg),*).into_rets())
                })
            }
        }
    };
}

impl_into_callable!();
impl_into_callable!(A);
impl_into_callable!(A, B);
impl_into_callable!(A, B, C);
impl_into_callable!(A, B, C, D);
