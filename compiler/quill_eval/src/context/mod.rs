//! The evaluation context created at each fallible site.
//!
//! A [`Context`] captures everything needed to retry or reinterpret a
//! failed field access or call: the member name, the syntax node, the
//! unevaluated argument expressions, the receiver, dot, the piped value,
//! the current failure and a result slot. Error-manager handlers receive it
//! mutably; argument evaluation is delegated back to the executor.
//!
//! Lifecycle: created → matching (managers consulted) → resolved or
//! unresolved → settled (result consumed, or failure escalated).

use std::collections::BTreeMap;
use std::sync::Arc;

use quill_ir::{ExprId, NodeRef};
use quill_value::errors::{expansion_too_deep, wrong_arg_count, wrong_type};
use quill_value::{ControlAction, EvalError, EvalResult, MapValue, ParamType, Value};

use crate::call_stack::CallFrame;
use crate::callable::{normalize, Callable, Ret};
use crate::exec::Executor;
use crate::manager::ErrorAction;
use crate::options::{ContextSource, MissingMode};
use crate::Template;

/// Maximum nesting of `ResultAsArray` expansions.
pub const MAX_EXPANSION_DEPTH: usize = 64;

/// Result of running a callable through the adapter.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The callable ran; `error` is its returned error, if any.
    Returned {
        value: Value,
        error: Option<EvalError>,
    },
    /// The supplied arguments do not fit the signature or fail to evaluate.
    Mismatch(EvalError),
}

impl Outcome {
    fn returned(rets: Vec<Ret>) -> Self {
        let (value, error) = normalize(rets);
        Outcome::Returned { value, error }
    }
}

/// State of one fallible evaluation step.
pub struct Context<'e, 't> {
    exec: &'e mut Executor<'t>,
    source: ContextSource,
    member: String,
    node: NodeRef<'t>,
    args: &'t [ExprId],
    callable: Option<Callable>,
    receiver: Value,
    dot: Value,
    final_arg: Option<Value>,
    failure: Option<EvalError>,
    result: Value,
    matches: BTreeMap<String, String>,
}

impl<'e, 't> Context<'e, 't> {
    pub(crate) fn new(
        exec: &'e mut Executor<'t>,
        source: ContextSource,
        member: impl Into<String>,
        node: NodeRef<'t>,
    ) -> Self {
        Context {
            exec,
            source,
            member: member.into(),
            node,
            args: &[],
            callable: None,
            receiver: Value::Invalid,
            dot: Value::Invalid,
            final_arg: None,
            failure: None,
            result: Value::Invalid,
            matches: BTreeMap::new(),
        }
    }

    #[must_use]
    pub(crate) fn with_args(mut self, args: &'t [ExprId], final_arg: Option<Value>) -> Self {
        if final_arg.is_some() && self.source.intersects(ContextSource::FIELD | ContextSource::CALL) {
            self.source |= ContextSource::PIPELINE;
        }
        self.args = args;
        self.final_arg = final_arg;
        self
    }

    #[must_use]
    pub(crate) fn with_callable(mut self, callable: Callable) -> Self {
        self.callable = Some(callable);
        self
    }

    #[must_use]
    pub(crate) fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = receiver;
        self
    }

    #[must_use]
    pub(crate) fn with_dot(mut self, dot: Value) -> Self {
        self.dot = dot;
        self
    }

    #[must_use]
    pub(crate) fn with_failure(mut self, failure: EvalError, provisional: Value) -> Self {
        self.failure = Some(failure);
        self.result = provisional;
        self
    }

    #[must_use]
    pub(crate) fn with_result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn source(&self) -> ContextSource {
        self.source
    }

    /// The field, method or function name; empty for print contexts.
    pub fn member_name(&self) -> &str {
        &self.member
    }

    pub fn node(&self) -> NodeRef<'t> {
        self.node
    }

    /// Template-source rendering of [`Context::node`].
    pub fn node_text(&self) -> String {
        self.node.render(&self.exec.tree().arena)
    }

    /// The unevaluated explicit arguments.
    pub fn args(&self) -> &'t [ExprId] {
        self.args
    }

    /// Number of arguments, counting a piped value.
    pub fn arg_count(&self) -> usize {
        self.args.len() + usize::from(self.final_arg.is_some())
    }

    pub fn callable(&self) -> Option<&Callable> {
        self.callable.as_ref()
    }

    /// The value the member was looked up on; invalid when there is none.
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn dot(&self) -> &Value {
        &self.dot
    }

    /// The value piped in from the previous pipeline stage.
    pub fn final_arg(&self) -> Option<&Value> {
        self.final_arg.as_ref()
    }

    pub fn error(&self) -> Option<&EvalError> {
        self.failure.as_ref()
    }

    /// The failure text, or `""` when there is none.
    pub fn error_text(&self) -> &str {
        self.failure.as_ref().map_or("", |e| e.message.as_str())
    }

    pub fn set_error(&mut self, error: impl Into<EvalError>) {
        self.failure = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.failure = None;
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn set_result(&mut self, value: Value) {
        self.result = value;
    }

    /// A capture group of the filter that matched, by index or name.
    ///
    /// `matched("0")` is the whole match; unknown groups yield `""`.
    pub fn matched(&self, group: &str) -> &str {
        self.matches.get(group).map_or("", String::as_str)
    }

    pub fn matches(&self) -> &BTreeMap<String, String> {
        &self.matches
    }

    pub(crate) fn set_matches(&mut self, matches: BTreeMap<String, String>) {
        self.matches = matches;
    }

    /// The data the template was executed with (`$`).
    pub fn global(&self) -> &Value {
        self.exec.vars().global()
    }

    /// Declared variables visible at this site, excluding `$`.
    pub fn variables(&self) -> MapValue {
        self.exec.vars().variables()
    }

    /// Declare a variable in the current block.
    pub fn bind(&mut self, name: &str, value: Value) {
        self.exec.vars_mut().push(name, value);
    }

    pub fn mode(&self) -> MissingMode {
        self.exec.template().missing_mode()
    }

    pub fn stack_len(&self) -> usize {
        self.exec.stack().depth()
    }

    /// The call frame `n` calls back from the current one.
    pub fn stack_peek(&self, n: usize) -> Option<&CallFrame> {
        self.exec.stack().peek(n)
    }

    pub fn template(&self) -> &'t Template {
        self.exec.template()
    }

    /// Whether the failing call was made directly under `trap`.
    pub fn trapped(&self) -> bool {
        self.stack_peek(1).is_some_and(|frame| frame.name == "trap")
    }

    /// Evaluate argument `index` against dot, coerced to `ty`.
    ///
    /// The index past the explicit arguments is the piped value; indexes
    /// beyond that yield an invalid value.
    pub fn eval_arg(&mut self, index: usize, ty: ParamType) -> EvalResult {
        match self.args.get(index) {
            Some(&expr) => {
                let dot = self.dot.clone();
                self.exec.eval_arg(&dot, ty, expr)
            }
            None if index == self.args.len() => match &self.final_arg {
                Some(value) => Ok(ty.check(value.clone())?),
                None => Ok(Value::Invalid),
            },
            None => Ok(Value::Invalid),
        }
    }

    /// Evaluate every argument, including the piped value.
    pub fn eval_args(&mut self) -> Result<Vec<Value>, ControlAction> {
        (0..self.arg_count())
            .map(|i| self.eval_arg(i, ParamType::Any))
            .collect()
    }

    /// Invoke `callable` (or the context's own) with this site's arguments.
    ///
    /// The receiver, if any, fills the first parameter. A returned error or
    /// an arity mismatch is written to the failure slot.
    pub fn call(&mut self, callable: Option<&Callable>) -> EvalResult {
        self.call_inner(callable, false)
    }

    /// Like [`Context::call`], passing this context as the first argument
    /// when the callable declares one.
    pub fn call_with_self(&mut self, callable: Option<&Callable>) -> EvalResult {
        self.call_inner(callable, true)
    }

    /// Look up function `name` and call it with this site's receiver and
    /// arguments. `None` when no such function exists.
    pub fn try_call(&mut self, name: &str) -> Result<Option<Value>, ControlAction> {
        let Some(callable) = self.exec.template().lookup_func(name).cloned() else {
            return Ok(None);
        };
        let value = self.call_inner(Some(&callable), true)?;
        Ok(Some(value))
    }

    /// Re-apply this site's member access to another receiver.
    pub fn eval_field(&mut self, receiver: Value) -> EvalResult {
        let dot = self.dot.clone();
        let member = self.member.clone();
        self.exec.eval_field(
            &dot,
            self.node,
            &member,
            self.args,
            self.final_arg.clone(),
            receiver,
        )
    }

    fn call_inner(&mut self, callable: Option<&Callable>, inject_self: bool) -> EvalResult {
        let Some(callable) = callable.or(self.callable.as_ref()).cloned() else {
            self.failure = Some(EvalError::new(format!("{} is not callable", self.member)));
            return Ok(Value::Invalid);
        };
        match self.adapt(&callable, inject_self)? {
            Outcome::Returned { value, error } => {
                self.failure = error;
                Ok(value)
            }
            Outcome::Mismatch(err) => {
                self.failure = Some(err);
                Ok(Value::Invalid)
            }
        }
    }

    /// Assemble arguments for `callable`, invoke it and normalise its
    /// results.
    pub(crate) fn adapt(
        &mut self,
        callable: &Callable,
        inject_self: bool,
    ) -> Result<Outcome, ControlAction> {
        let sig = Arc::clone(callable.signature());
        let self_slot = inject_self && sig.takes_context();
        let first = usize::from(self_slot);

        if self_slot && sig.params.len() == 1 && !sig.variadic {
            tracing::trace!(member = %self.member, "invoking context-only callable");
            return self.run(callable, Vec::new());
        }

        let receiver = (self.receiver.is_valid() && (sig.params.len() > first || sig.variadic))
            .then(|| self.receiver.clone());
        let offset = first + usize::from(receiver.is_some());
        let got = self.arg_count();
        let fixed = sig.fixed_len();

        if !sig.variadic && got + offset != sig.params.len() {
            let want = sig.params.len().saturating_sub(offset);
            return Ok(Outcome::Mismatch(wrong_arg_count(&self.member, want, got, false)));
        }
        if sig.variadic && got + offset < fixed {
            let want = fixed.saturating_sub(offset);
            return Ok(Outcome::Mismatch(wrong_arg_count(&self.member, want, got, true)));
        }

        let mut values = Vec::with_capacity(got + offset - first);
        let mut slot = first;
        if let Some(receiver) = receiver {
            let ty = sig.param_at(slot).unwrap_or(ParamType::Any);
            match ty.convert_lossless(&receiver) {
                Some(value) => values.push(value),
                None => return Ok(Outcome::Mismatch(wrong_type(ty.name(), &receiver.type_name()))),
            }
            slot += 1;
        }
        for i in 0..got {
            let ty = sig.param_at(slot + i).unwrap_or(ParamType::Any);
            match self.eval_arg(i, ty) {
                Ok(value) => values.push(value),
                Err(ControlAction::Error(err)) => return Ok(Outcome::Mismatch(*err)),
                Err(flow) => return Err(flow),
            }
        }
        tracing::trace!(member = %self.member, args = values.len(), "invoking callable");
        self.run(callable, values)
    }

    /// Flow signals pass through; errors become the call's returned error.
    fn run(&mut self, callable: &Callable, values: Vec<Value>) -> Result<Outcome, ControlAction> {
        match callable.invoke(self, values) {
            Ok(rets) => Ok(Outcome::returned(rets)),
            Err(ControlAction::Error(err)) => Ok(Outcome::Returned {
                value: Value::Invalid,
                error: Some(*err),
            }),
            Err(flow) => Err(flow),
        }
    }

    /// Offer the current state to the registered managers.
    ///
    /// Groups are consulted in name order, managers in registration order.
    /// The first handler that replaces the result ends the scan and clears
    /// the failure; declining handlers may rewrite the failure for the
    /// managers after them. Returns whether a result was substituted.
    #[tracing::instrument(level = "debug", skip_all, fields(member = %self.member, source = %self.source))]
    pub(crate) fn try_recover(&mut self) -> Result<bool, ControlAction> {
        let registry = self.exec.template().registry();
        for manager in registry.iter() {
            self.matches.clear();
            if !manager.can_manage(self) {
                continue;
            }
            let (value, action) = match manager.handle(self) {
                Ok(outcome) => outcome,
                Err(ControlAction::Error(err)) => {
                    self.failure = Some(*err);
                    continue;
                }
                Err(flow) => return Err(flow),
            };
            match action {
                ErrorAction::NoReplace => continue,
                ErrorAction::ResultReplaced => self.result = value,
                ErrorAction::ResultAsArray => self.result = self.expand(value)?,
            }
            tracing::debug!(%action, "error manager replaced result");
            self.failure = None;
            self.matches.clear();
            return Ok(true);
        }
        self.matches.clear();
        Ok(false)
    }

    /// Re-apply the member to each element of `value`.
    ///
    /// Nesting is capped at [`MAX_EXPANSION_DEPTH`]; a manager answering
    /// `ResultAsArray` for every element fails there.
    fn expand(&mut self, value: Value) -> EvalResult {
        let depth = self.exec.expansions();
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(expansion_too_deep(&self.member, MAX_EXPANSION_DEPTH).into());
        }
        let items = match value {
            Value::List(items) => items,
            other => vec![other],
        };
        self.exec.set_expansions(depth + 1);
        let results: Result<Vec<Value>, ControlAction> =
            items.into_iter().map(|item| self.eval_field(item)).collect();
        self.exec.set_expansions(depth);
        Ok(Value::List(results?))
    }

    /// Recover if possible, then yield the result or escalate the failure.
    ///
    /// A nil or missing result without a failure is offered as well.
    pub(crate) fn settle(mut self) -> EvalResult {
        if self.failure.is_some() || matches!(self.result, Value::Nil | Value::Invalid) {
            self.try_recover()?;
        }
        match self.failure {
            Some(err) => Err(err.into()),
            None => Ok(self.result),
        }
    }

    /// Like [`Context::settle`] for missing-key failures: an unrecovered
    /// failure escalates only in `ERROR` mode, otherwise the provisional
    /// result stands.
    pub(crate) fn settle_missing(mut self) -> EvalResult {
        self.try_recover()?;
        match self.failure {
            Some(err) if self.mode().contains(MissingMode::ERROR) => Err(err.into()),
            _ => Ok(self.result),
        }
    }

    /// Give managers a chance to rewrite a value about to be printed.
    pub(crate) fn settle_print(mut self) -> EvalResult {
        self.try_recover()?;
        match self.failure {
            Some(err) => Err(err.into()),
            None => Ok(self.result),
        }
    }
}
