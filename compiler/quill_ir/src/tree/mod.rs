//! Named template trees and the programmatic builder.

use crate::{ExprArena, ExprId, ExprKind, Node, Pipeline, Pos};

/// A named template body together with the arena its expressions live in.
#[derive(Clone, Debug)]
pub struct Tree {
    pub name: String,
    pub root: Vec<Node>,
    pub arena: ExprArena,
}

/// Builds a [`Tree`] without a parser.
///
/// Operands are allocated into the builder's arena at the current position,
/// set with [`TreeBuilder::at`]. Path strings use template syntax:
/// `field(".a.b")`, `var("$x.a")`.
///
/// ```ignore
/// let mut b = TreeBuilder::new("t");
/// let list = b.field(".List");
/// let root = vec![Node::Action(Pipeline::call(b.pos(), [list]))];
/// let tree = b.finish(root);
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    name: String,
    arena: ExprArena,
    pos: Pos,
}

impl TreeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TreeBuilder {
            name: name.into(),
            arena: ExprArena::new(),
            pos: Pos::new(1, 1),
        }
    }

    /// Set the position recorded for subsequently built operands.
    pub fn at(&mut self, line: u32, col: u32) -> &mut Self {
        self.pos = Pos::new(line, col);
        self
    }

    #[inline]
    pub fn pos(&self) -> Pos {
        self.pos
    }

    fn alloc(&mut self, kind: ExprKind) -> ExprId {
        self.arena.alloc(kind, self.pos)
    }

    pub fn dot(&mut self) -> ExprId {
        self.alloc(ExprKind::Dot)
    }

    pub fn nil(&mut self) -> ExprId {
        self.alloc(ExprKind::Nil)
    }

    pub fn bool(&mut self, b: bool) -> ExprId {
        self.alloc(ExprKind::Bool(b))
    }

    pub fn int(&mut self, n: i64) -> ExprId {
        self.alloc(ExprKind::Int(n))
    }

    pub fn float(&mut self, x: f64) -> ExprId {
        self.alloc(ExprKind::Float(x))
    }

    pub fn string(&mut self, s: impl Into<String>) -> ExprId {
        self.alloc(ExprKind::Str(s.into()))
    }

    /// `.a.b`: a field chain on dot. `"."` alone yields [`ExprKind::Dot`].
    pub fn field(&mut self, path: &str) -> ExprId {
        let idents = split_path(path.trim_start_matches('.'));
        if idents.is_empty() {
            return self.dot();
        }
        self.alloc(ExprKind::Field(idents))
    }

    /// `$x.a.b`: a variable with an optional field chain.
    pub fn var(&mut self, path: &str) -> ExprId {
        self.alloc(ExprKind::Variable(split_path(path)))
    }

    /// A function identifier.
    pub fn ident(&mut self, name: &str) -> ExprId {
        self.alloc(ExprKind::Identifier(name.to_string()))
    }

    /// `(base).a.b`.
    pub fn chain(&mut self, base: ExprId, path: &str) -> ExprId {
        let fields = split_path(path.trim_start_matches('.'));
        self.alloc(ExprKind::Chain { base, fields })
    }

    /// A parenthesised pipeline used as an operand.
    pub fn pipe(&mut self, pipe: Pipeline) -> ExprId {
        self.alloc(ExprKind::Pipe(Box::new(pipe)))
    }

    /// Single-command pipeline at the current position.
    pub fn cmd(&self, args: impl IntoIterator<Item = ExprId>) -> Pipeline {
        Pipeline::call(self.pos, args)
    }

    /// `{{args...}}` as a node.
    pub fn action(&self, args: impl IntoIterator<Item = ExprId>) -> Node {
        Node::Action(self.cmd(args))
    }

    pub fn finish(self, root: Vec<Node>) -> Tree {
        Tree {
            name: self.name,
            root,
            arena: self.arena,
        }
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
