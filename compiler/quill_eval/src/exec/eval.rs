//! Operand, field and call evaluation.
//!
//! These are the fallible sites. Each failure builds a [`Context`], offers
//! it to the error managers and either continues with the recovered result
//! or escalates.

use std::sync::Arc;

use quill_ir::{Command, ExprId, ExprKind, NodeRef, Pipeline};
use quill_value::errors::{
    bad_result_count, call_failed, cant_evaluate_field, expected_literal, field_has_arguments,
    function_not_defined, nil_data_no_entry, nil_pointer, no_entry_for_key, not_a_function,
    undefined_variable, unexported_field, wrong_type,
};
use quill_value::{is_exported, ControlAction, EvalError, EvalResult, ParamType, Value};

use super::Executor;
use crate::call_stack::CallFrame;
use crate::callable::Callable;
use crate::context::{Context, Outcome};
use crate::options::{ContextSource, MissingMode};

impl<'t> Executor<'t> {
    /// Evaluate a pipeline and bind its declared variables.
    pub(crate) fn eval_pipeline(&mut self, dot: &Value, pipe: &'t Pipeline) -> EvalResult {
        let mut value = None;
        for cmd in &pipe.cmds {
            value = Some(self.eval_command(dot, cmd, value.take())?);
        }
        let value = value.unwrap_or_default();
        for name in &pipe.decl {
            if pipe.is_assign {
                if self.vars.assign(name, value.clone()).is_err() {
                    let err = undefined_variable(name);
                    return Err(self.annotate(err.into(), NodeRef::Pipeline(pipe)));
                }
            } else {
                self.vars.push(name.as_str(), value.clone());
            }
        }
        Ok(value)
    }

    fn eval_command(&mut self, dot: &Value, cmd: &'t Command, final_arg: Option<Value>) -> EvalResult {
        let Some(head) = cmd.head() else {
            return Ok(final_arg.unwrap_or_default());
        };
        let tree = self.tree;
        let args = cmd.rest();
        let node = NodeRef::Expr(head);
        let result = match tree.arena.kind(head) {
            ExprKind::Field(path) => {
                self.eval_field_path(dot, node, dot.clone(), path, args, final_arg)
            }
            ExprKind::Chain { base, fields } => match self.eval_operand(dot, *base) {
                Ok(receiver) => self.eval_field_path(dot, node, receiver, fields, args, final_arg),
                Err(action) => Err(action),
            },
            ExprKind::Identifier(name) => self.eval_function(dot, node, name, args, final_arg),
            ExprKind::Variable(path) => self.eval_variable(dot, node, path, args, final_arg),
            ExprKind::Nil => Err(EvalError::new("nil is not a command").into()),
            ExprKind::Pipe(_) | ExprKind::Dot | ExprKind::Bool(_) | ExprKind::Int(_)
            | ExprKind::Float(_) | ExprKind::Str(_) => {
                if !args.is_empty() || final_arg.is_some() {
                    let name = tree.arena.display(head).to_string();
                    Err(not_a_function(&name).into())
                } else {
                    self.eval_operand(dot, head)
                }
            }
        };
        result.map_err(|action| self.annotate(action, node))
    }

    /// Evaluate an operand that takes no arguments.
    pub(crate) fn eval_operand(&mut self, dot: &Value, id: ExprId) -> EvalResult {
        let tree = self.tree;
        let node = NodeRef::Expr(id);
        let result = match tree.arena.kind(id) {
            ExprKind::Dot => Ok(dot.clone()),
            ExprKind::Field(path) => self.eval_field_path(dot, node, dot.clone(), path, &[], None),
            ExprKind::Variable(path) => self.eval_variable(dot, node, path, &[], None),
            ExprKind::Identifier(name) => self.eval_function(dot, node, name, &[], None),
            ExprKind::Chain { base, fields } => match self.eval_operand(dot, *base) {
                Ok(receiver) => self.eval_field_path(dot, node, receiver, fields, &[], None),
                Err(action) => Err(action),
            },
            ExprKind::Pipe(pipe) => self.eval_pipeline(dot, pipe),
            literal => Ok(literal_value(literal)),
        };
        result.map_err(|action| self.annotate(action, node))
    }

    /// Evaluate an argument expression against a declared parameter type.
    ///
    /// Literals are checked by form before conversion; every other operand
    /// is evaluated first and its value checked.
    pub(crate) fn eval_arg(&mut self, dot: &Value, ty: ParamType, id: ExprId) -> EvalResult {
        let tree = self.tree;
        let kind = tree.arena.kind(id);
        let result = if kind.is_literal() {
            literal_arg(ty, kind, || tree.arena.display(id).to_string()).map_err(ControlAction::from)
        } else {
            match self.eval_operand(dot, id) {
                Ok(value) => ty.check(value).map_err(ControlAction::from),
                Err(action) => Err(action),
            }
        };
        result.map_err(|action| self.annotate(action, NodeRef::Expr(id)))
    }

    fn eval_variable(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        path: &'t [String],
        args: &'t [ExprId],
        final_arg: Option<Value>,
    ) -> EvalResult {
        let Some((name, fields)) = path.split_first() else {
            return Ok(Value::Invalid);
        };
        let value = self
            .vars
            .lookup(name)
            .cloned()
            .ok_or_else(|| undefined_variable(name))?;
        if fields.is_empty() {
            if !args.is_empty() || final_arg.is_some() {
                return Err(not_a_function(name).into());
            }
            return Ok(value);
        }
        self.eval_field_path(dot, node, value, fields, args, final_arg)
    }

    fn eval_field_path(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        receiver: Value,
        path: &'t [String],
        args: &'t [ExprId],
        final_arg: Option<Value>,
    ) -> EvalResult {
        let Some((last, init)) = path.split_last() else {
            return Ok(receiver);
        };
        let mut receiver = receiver;
        for name in init {
            receiver = self.eval_field(dot, node, name, &[], None, receiver)?;
        }
        self.eval_field(dot, node, last, args, final_arg, receiver)
    }

    /// Look up `name` on `receiver`: a registered method, a struct field or
    /// a map key, in that order.
    pub(crate) fn eval_field(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        name: &str,
        args: &'t [ExprId],
        final_arg: Option<Value>,
        receiver: Value,
    ) -> EvalResult {
        let type_name = receiver.type_name();
        if let Some(method) = self.template.lookup_method(&type_name, name) {
            return self.eval_call(dot, node, name, method.clone(), args, final_arg, receiver);
        }

        let has_args = !args.is_empty() || final_arg.is_some();
        let mut missing = false;
        let (failure, provisional) = match &receiver {
            Value::Struct(s) => match s.get(name) {
                Some(_) if !is_exported(name) => (unexported_field(name, &type_name), Value::Invalid),
                Some(_) if has_args => (field_has_arguments(name), Value::Invalid),
                Some(value) => return self.found_field(dot, node, name, &receiver, value.clone()),
                None => (cant_evaluate_field(name, &type_name), Value::Invalid),
            },
            Value::Map(map) => match map.get(name) {
                Some(_) if has_args => (field_has_arguments(name), Value::Invalid),
                Some(value) => return self.found_field(dot, node, name, &receiver, value.clone()),
                None if has_args => (cant_evaluate_field(name, &type_name), Value::Invalid),
                None => {
                    missing = true;
                    let provisional = if self.template.missing_mode().contains(MissingMode::ZERO_VALUE) {
                        map.zero_entry()
                    } else {
                        Value::Invalid
                    };
                    (no_entry_for_key(name), provisional)
                }
            },
            Value::Invalid => {
                missing = true;
                (nil_data_no_entry(name), Value::Invalid)
            }
            Value::Nil => (nil_pointer(name), Value::Invalid),
            _ => (cant_evaluate_field(name, &type_name), Value::Invalid),
        };

        let ctx = Context::new(self, ContextSource::FIELD, name, node)
            .with_args(args, final_arg)
            .with_receiver(receiver)
            .with_dot(dot.clone())
            .with_failure(failure, provisional);
        if missing {
            ctx.settle_missing()
        } else {
            ctx.settle()
        }
    }

    /// A field that holds nil is still offered to the managers.
    fn found_field(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        name: &str,
        receiver: &Value,
        value: Value,
    ) -> EvalResult {
        if !matches!(value, Value::Nil | Value::Invalid) || self.template.registry().is_empty() {
            return Ok(value);
        }
        Context::new(self, ContextSource::FIELD, name, node)
            .with_receiver(receiver.clone())
            .with_dot(dot.clone())
            .with_result(value)
            .settle()
    }

    fn eval_function(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        name: &str,
        args: &'t [ExprId],
        final_arg: Option<Value>,
    ) -> EvalResult {
        match self.template.lookup_func(name) {
            Some(callable) => {
                self.eval_call(dot, node, name, callable.clone(), args, final_arg, Value::Invalid)
            }
            None => Context::new(self, ContextSource::CALL, name, node)
                .with_args(args, final_arg)
                .with_dot(dot.clone())
                .with_failure(function_not_defined(name), Value::Invalid)
                .settle(),
        }
    }

    /// Invoke a function or method, tracking it on the call stack.
    ///
    /// The frame stays pushed while managers handle a failure, so handlers
    /// can inspect who made the call.
    #[allow(clippy::too_many_arguments, reason = "mirrors the call site")]
    fn eval_call(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        name: &str,
        callable: Callable,
        args: &'t [ExprId],
        final_arg: Option<Value>,
        receiver: Value,
    ) -> EvalResult {
        self.stack
            .push(CallFrame::new(name, Arc::clone(callable.signature())))?;
        let result = self.eval_call_inner(dot, node, name, callable, args, final_arg, receiver);
        self.stack.pop();
        result
    }

    #[allow(clippy::too_many_arguments, reason = "mirrors the call site")]
    fn eval_call_inner(
        &mut self,
        dot: &Value,
        node: NodeRef<'t>,
        name: &str,
        callable: Callable,
        args: &'t [ExprId],
        final_arg: Option<Value>,
        receiver: Value,
    ) -> EvalResult {
        let contextual = callable.is_contextual();
        let signature = Arc::clone(callable.signature());
        let mut ctx = Context::new(self, ContextSource::CALL, name, node)
            .with_args(args, final_arg)
            .with_callable(callable.clone())
            .with_receiver(receiver)
            .with_dot(dot.clone());

        if !contextual && !signature.is_standard() {
            ctx.set_error(bad_result_count(name, signature.results.len()));
            return ctx.settle();
        }
        match ctx.adapt(&callable, contextual)? {
            Outcome::Returned { value, error: None } => ctx.set_result(value),
            Outcome::Returned {
                error: Some(err), ..
            } if contextual => ctx.set_error(err),
            Outcome::Returned {
                error: Some(err), ..
            } => ctx.set_error(call_failed(name, &err)),
            Outcome::Mismatch(err) => ctx.set_error(err),
        }
        ctx.settle()
    }

    /// Print a pipeline's value, letting managers rewrite it first.
    pub(crate) fn print_value(&mut self, pipe: &'t Pipeline, value: Value) -> Result<(), ControlAction> {
        let value = if self.template.registry().is_empty() {
            value
        } else {
            Context::new(self, ContextSource::PRINT, "", NodeRef::Pipeline(pipe))
                .with_receiver(value.clone())
                .with_result(value)
                .settle_print()
                .map_err(|action| self.annotate(action, NodeRef::Pipeline(pipe)))?
        };
        self.out.print(&value.to_string());
        Ok(())
    }
}

fn literal_value(kind: &ExprKind) -> Value {
    match kind {
        ExprKind::Bool(b) => Value::Bool(*b),
        ExprKind::Int(n) => Value::Int(*n),
        ExprKind::Float(x) => Value::Float(*x),
        ExprKind::Str(s) => Value::string(s.as_str()),
        ExprKind::Nil => Value::Nil,
        _ => Value::Invalid,
    }
}

/// Check a literal argument's form against `ty`.
fn literal_arg(ty: ParamType, kind: &ExprKind, display: impl FnOnce() -> String) -> Result<Value, EvalError> {
    match (ty, kind) {
        (_, ExprKind::Nil) => ty.check(Value::Nil),
        (ParamType::Any, kind) => Ok(literal_value(kind)),
        (ParamType::Bool, ExprKind::Bool(b)) => Ok(Value::Bool(*b)),
        (ParamType::Int, ExprKind::Int(n)) => Ok(Value::Int(*n)),
        #[allow(clippy::cast_possible_truncation, reason = "only integral floats")]
        (ParamType::Int, ExprKind::Float(x)) if x.fract() == 0.0 && x.is_finite() => {
            Ok(Value::Int(*x as i64))
        }
        (ParamType::Float, ExprKind::Float(x)) => Ok(Value::Float(*x)),
        #[allow(clippy::cast_precision_loss, reason = "integer literals widen to float64")]
        (ParamType::Float, ExprKind::Int(n)) => Ok(Value::Float(*n as f64)),
        (ParamType::Str, ExprKind::Str(s)) => Ok(Value::string(s.as_str())),
        (ParamType::List | ParamType::Map | ParamType::Context, kind) => {
            Err(wrong_type(ty.name(), &literal_value(kind).type_name()))
        }
        _ => Err(expected_literal(ty.literal_name(), &display())),
    }
}
