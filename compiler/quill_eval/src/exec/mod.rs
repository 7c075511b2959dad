//! Tree-walking executor.
//!
//! Walks the nodes of a [`Tree`] against a data value, writing to an
//! [`OutputBuffer`]. Statement walking lives here; operand, field and call
//! evaluation (the sites that create [`Context`]s) live in `eval`.
//!
//! Flow signals travel on the same `Err(ControlAction)` channel as errors:
//! `range` absorbs `Break`/`Continue`, template invocations absorb
//! `Return`, everything else passes them through untouched.

mod eval;

use quill_ir::{Branch, Node, NodeRef, Pipeline, Pos, Tree};
use quill_value::errors::{cannot_range, depth_exceeded, undefined_template};
use quill_value::{ControlAction, Value};

use crate::call_stack::CallStack;
use crate::environment::Environment;
use crate::output::OutputBuffer;
use crate::stack::ensure_sufficient_stack;
use crate::template::ExecError;
use crate::Template;

/// Maximum nesting of `{{template}}` invocations.
pub const MAX_TEMPLATE_DEPTH: usize = 10_000;

/// Where the escaping error was first observed.
#[derive(Clone, Debug)]
struct ErrorSite {
    template: String,
    pos: Pos,
    node: String,
}

/// Per-render execution state.
///
/// Never shared between renders: each has its own output, variable scope
/// and call stack, while the template itself is only borrowed.
pub(crate) struct Executor<'t> {
    template: &'t Template,
    tree: &'t Tree,
    out: OutputBuffer,
    vars: Environment,
    stack: CallStack,
    depth: usize,
    expansions: usize,
    site: Option<ErrorSite>,
}

impl<'t> Executor<'t> {
    pub(crate) fn new(template: &'t Template, tree: &'t Tree, out: OutputBuffer, data: Value) -> Self {
        Executor {
            template,
            tree,
            out,
            vars: Environment::new(data),
            stack: CallStack::default(),
            depth: 0,
            expansions: 0,
            site: None,
        }
    }

    pub(crate) fn template(&self) -> &'t Template {
        self.template
    }

    pub(crate) fn tree(&self) -> &'t Tree {
        self.tree
    }

    pub(crate) fn vars(&self) -> &Environment {
        &self.vars
    }

    pub(crate) fn vars_mut(&mut self) -> &mut Environment {
        &mut self.vars
    }

    pub(crate) fn stack(&self) -> &CallStack {
        &self.stack
    }

    /// Result-array expansions currently in progress.
    pub(crate) fn expansions(&self) -> usize {
        self.expansions
    }

    pub(crate) fn set_expansions(&mut self, n: usize) {
        self.expansions = n;
    }

    /// Render the tree; the executor is consumed.
    #[tracing::instrument(level = "debug", skip_all, fields(template = %self.tree.name))]
    pub(crate) fn run(mut self) -> Result<String, ExecError> {
        let dot = self.vars.global().clone();
        let tree = self.tree;
        let outcome = self.walk(&dot, &tree.root);
        match self.finish_invocation(0, outcome) {
            Ok(()) => Ok(self.out.into_output()),
            Err(action) => {
                if action.is_flow() {
                    self.site = None;
                }
                let cause = action.into_eval_error();
                tracing::debug!(error = %cause, "render failed");
                Err(self.exec_error(cause))
            }
        }
    }

    fn exec_error(&mut self, cause: quill_value::EvalError) -> ExecError {
        match self.site.take() {
            Some(site) => ExecError {
                template: site.template,
                pos: (!site.pos.is_dummy()).then_some(site.pos),
                node: site.node,
                cause,
            },
            None => ExecError {
                template: self.tree.name.clone(),
                pos: cause.location,
                node: String::new(),
                cause,
            },
        }
    }

    /// Record the site of an error that carries no position yet.
    fn annotate(&mut self, action: ControlAction, node: NodeRef<'t>) -> ControlAction {
        match action {
            ControlAction::Error(mut err) if err.location.is_none() => {
                let pos = node.pos(&self.tree.arena);
                if !pos.is_dummy() {
                    err.location = Some(pos);
                }
                self.site = Some(ErrorSite {
                    template: self.tree.name.clone(),
                    pos,
                    node: node.render(&self.tree.arena),
                });
                ControlAction::Error(err)
            }
            other => other,
        }
    }

    pub(crate) fn walk(&mut self, dot: &Value, nodes: &'t [Node]) -> Result<(), ControlAction> {
        for node in nodes {
            self.walk_node(dot, node)?;
        }
        Ok(())
    }

    fn walk_node(&mut self, dot: &Value, node: &'t Node) -> Result<(), ControlAction> {
        match node {
            Node::Text(text) => {
                self.out.print(text);
                Ok(())
            }
            Node::Action(pipe) => {
                let value = self.eval_pipeline(dot, pipe)?;
                if pipe.decl.is_empty() {
                    self.print_value(pipe, value)?;
                }
                Ok(())
            }
            Node::If(branch) => self.walk_branch(dot, branch, false),
            Node::With(branch) => self.walk_branch(dot, branch, true),
            Node::Range(branch) => {
                let mark = self.vars.mark();
                let outcome = self.walk_range(dot, branch);
                self.vars.pop(mark);
                outcome
            }
            Node::Template { pos, name, pipe } => {
                self.walk_template(dot, *pos, name, pipe.as_ref())
            }
        }
    }

    /// `if` and `with`; `with` rebinds dot to the pipeline value.
    fn walk_branch(&mut self, dot: &Value, branch: &'t Branch, with: bool) -> Result<(), ControlAction> {
        let mark = self.vars.mark();
        let outcome = match self.eval_pipeline(dot, &branch.pipe) {
            Ok(value) if value.is_truthy() => {
                if with {
                    self.walk(&value, &branch.list)
                } else {
                    self.walk(dot, &branch.list)
                }
            }
            Ok(_) => self.walk(dot, &branch.else_list),
            Err(action) => Err(action),
        };
        self.vars.pop(mark);
        outcome
    }

    fn walk_range(&mut self, dot: &Value, branch: &'t Branch) -> Result<(), ControlAction> {
        let value = self.eval_pipeline(dot, &branch.pipe)?;
        match &value {
            Value::List(items) if !items.is_empty() => {
                for (i, item) in items.iter().enumerate() {
                    if !self.range_step(branch, Value::from(i), item.clone())? {
                        break;
                    }
                }
            }
            Value::Map(map) if !map.is_empty() => {
                for (key, item) in map.iter() {
                    if !self.range_step(branch, Value::string(key.as_str()), item.clone())? {
                        break;
                    }
                }
            }
            Value::Int(n) if *n > 0 => {
                for i in 0..*n {
                    if !self.range_step(branch, Value::Int(i), Value::Int(i))? {
                        break;
                    }
                }
            }
            Value::List(_) | Value::Map(_) | Value::Int(_) | Value::Invalid | Value::Nil => {
                return self.walk(dot, &branch.else_list);
            }
            other => {
                let err = cannot_range(&other.type_name());
                return Err(self.annotate(err.into(), NodeRef::Pipeline(&branch.pipe)));
            }
        }
        Ok(())
    }

    /// One `range` iteration; `false` once the body breaks.
    fn range_step(&mut self, branch: &'t Branch, key: Value, elem: Value) -> Result<bool, ControlAction> {
        let decls = branch.pipe.decl.len();
        if decls > 0 {
            self.vars.set_top(1, elem.clone());
        }
        if decls > 1 {
            self.vars.set_top(2, key);
        }
        let mark = self.vars.mark();
        let outcome = self.walk(&elem, &branch.list);
        self.vars.pop(mark);
        match outcome {
            Ok(()) | Err(ControlAction::Continue) => Ok(true),
            Err(ControlAction::Break) => Ok(false),
            Err(other) => Err(other),
        }
    }

    fn walk_template(
        &mut self,
        dot: &Value,
        pos: Pos,
        name: &'t str,
        pipe: Option<&'t Pipeline>,
    ) -> Result<(), ControlAction> {
        let node = NodeRef::Invocation { name, pos };
        let Some(tree) = self.template.lookup_tree(name) else {
            return Err(self.annotate(undefined_template(name).into(), node));
        };
        let dot = match pipe {
            Some(pipe) => self.eval_pipeline(dot, pipe)?,
            None => Value::Nil,
        };
        if self.depth >= MAX_TEMPLATE_DEPTH {
            return Err(self.annotate(depth_exceeded(MAX_TEMPLATE_DEPTH).into(), node));
        }

        let saved_tree = std::mem::replace(&mut self.tree, tree);
        let saved_vars = std::mem::replace(&mut self.vars, Environment::new(dot.clone()));
        self.depth += 1;
        let mark = self.out.mark();
        let outcome = ensure_sufficient_stack(|| self.walk(&dot, &tree.root));
        self.depth -= 1;
        self.vars = saved_vars;
        self.tree = saved_tree;
        self.finish_invocation(mark, outcome)
    }

    /// Absorb `return` at an invocation boundary.
    ///
    /// Returned values replace everything the invocation printed; a bare
    /// `return` keeps the output and stops.
    fn finish_invocation(
        &mut self,
        mark: usize,
        outcome: Result<(), ControlAction>,
    ) -> Result<(), ControlAction> {
        match outcome {
            Err(ControlAction::Return(values)) => {
                if !values.is_empty() {
                    self.out.truncate(mark);
                    let value = Value::collapse(values);
                    self.out.print(&value.to_string());
                }
                Ok(())
            }
            other => other,
        }
    }
}
