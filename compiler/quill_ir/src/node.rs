//! Statement nodes: commands, pipelines and the node tree.

use std::fmt;

use smallvec::SmallVec;

use crate::{ExprArena, ExprId, Pos};

/// One stage of a pipeline: an operand followed by its arguments.
///
/// `args[0]` is the callee (identifier, field, variable, ...) and the rest
/// are the explicit arguments. The executor appends the previous stage's
/// value as the final argument.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub pos: Pos,
    pub args: SmallVec<[ExprId; 4]>,
}

impl Command {
    pub fn new(pos: Pos, args: impl IntoIterator<Item = ExprId>) -> Self {
        Command {
            pos,
            args: args.into_iter().collect(),
        }
    }

    /// The operand evaluated for this command.
    #[inline]
    pub fn head(&self) -> Option<ExprId> {
        self.args.first().copied()
    }

    /// Explicit arguments after the head.
    #[inline]
    pub fn rest(&self) -> &[ExprId] {
        self.args.get(1..).unwrap_or(&[])
    }

    fn fmt_with(&self, arena: &ExprArena, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            arena.fmt_expr(*arg, f)?;
        }
        Ok(())
    }
}

/// A pipeline with optional variable declaration (`$x := a | b`).
#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    pub pos: Pos,
    /// Declared or assigned variables, names including `$`.
    pub decl: Vec<String>,
    /// `$x = ...` (assignment) rather than `$x := ...` (declaration).
    pub is_assign: bool,
    pub cmds: Vec<Command>,
}

impl Pipeline {
    pub fn new(pos: Pos, cmds: Vec<Command>) -> Self {
        Pipeline {
            pos,
            decl: Vec::new(),
            is_assign: false,
            cmds,
        }
    }

    /// A single-command pipeline.
    pub fn call(pos: Pos, args: impl IntoIterator<Item = ExprId>) -> Self {
        Pipeline::new(pos, vec![Command::new(pos, args)])
    }

    /// Turn this pipeline into `$name := ...`.
    #[must_use]
    pub fn declare(mut self, name: &str) -> Self {
        self.decl = vec![name.to_string()];
        self.is_assign = false;
        self
    }

    /// Turn this pipeline into `$name = ...`.
    #[must_use]
    pub fn assign(mut self, name: &str) -> Self {
        self.decl = vec![name.to_string()];
        self.is_assign = true;
        self
    }

    /// Turn this pipeline into `$key, $elem := ...` (range only).
    #[must_use]
    pub fn declare_pair(mut self, key: &str, elem: &str) -> Self {
        self.decl = vec![key.to_string(), elem.to_string()];
        self.is_assign = false;
        self
    }

    /// Append a stage: `self | args...`.
    #[must_use]
    pub fn pipe(mut self, args: impl IntoIterator<Item = ExprId>) -> Self {
        let pos = self.pos;
        self.cmds.push(Command::new(pos, args));
        self
    }

    /// Wrap this pipeline in a [`fmt::Display`] adapter.
    pub fn display<'a>(&'a self, arena: &'a ExprArena) -> PipelineDisplay<'a> {
        PipelineDisplay { pipe: self, arena }
    }

    pub(crate) fn fmt_with(&self, arena: &ExprArena, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.decl.is_empty() {
            f.write_str(&self.decl.join(", "))?;
            f.write_str(if self.is_assign { " = " } else { " := " })?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            cmd.fmt_with(arena, f)?;
        }
        Ok(())
    }
}

pub struct PipelineDisplay<'a> {
    pipe: &'a Pipeline,
    arena: &'a ExprArena,
}

impl fmt::Display for PipelineDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.pipe.fmt_with(self.arena, f)
    }
}

/// Shared shape of `if`, `with` and `range`.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub pos: Pos,
    pub pipe: Pipeline,
    pub list: Vec<Node>,
    pub else_list: Vec<Node>,
}

impl Branch {
    pub fn new(pipe: Pipeline, list: Vec<Node>) -> Self {
        Branch {
            pos: pipe.pos,
            pipe,
            list,
            else_list: Vec::new(),
        }
    }

    #[must_use]
    pub fn or_else(mut self, else_list: Vec<Node>) -> Self {
        self.else_list = else_list;
        self
    }
}

/// A statement in a template body.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Literal text copied to the output.
    Text(String),
    /// `{{pipeline}}`: printed unless it declares variables.
    Action(Pipeline),
    If(Branch),
    With(Branch),
    Range(Branch),
    /// `{{template "name" pipeline}}`.
    Template {
        pos: Pos,
        name: String,
        pipe: Option<Pipeline>,
    },
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn pos(&self) -> Pos {
        match self {
            Node::Text(_) => Pos::DUMMY,
            Node::Action(pipe) => pipe.pos,
            Node::If(b) | Node::With(b) | Node::Range(b) => b.pos,
            Node::Template { pos, .. } => *pos,
        }
    }
}

/// A borrowed reference to the node being evaluated, for diagnostics.
///
/// Contexts carry one of these so handlers can report where a failure
/// happened without owning any part of the tree.
#[derive(Copy, Clone, Debug)]
pub enum NodeRef<'t> {
    Expr(ExprId),
    Pipeline(&'t Pipeline),
    Invocation { name: &'t str, pos: Pos },
}

impl NodeRef<'_> {
    pub fn pos(self, arena: &ExprArena) -> Pos {
        match self {
            NodeRef::Expr(id) => arena.pos(id),
            NodeRef::Pipeline(pipe) => pipe.pos,
            NodeRef::Invocation { pos, .. } => pos,
        }
    }

    /// Template-source rendering of the node, as used in diagnostics.
    pub fn render(self, arena: &ExprArena) -> String {
        match self {
            NodeRef::Expr(id) => arena.display(id).to_string(),
            NodeRef::Pipeline(pipe) => pipe.display(arena).to_string(),
            NodeRef::Invocation { name, .. } => format!("{{{{template {name:?}}}}}"),
        }
    }
}
