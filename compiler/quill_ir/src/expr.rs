//! Expression arena and expression kinds.
//!
//! Expressions are the operands of commands: literals, `.` and field
//! chains, variables, function identifiers and parenthesised pipelines.
//! They are stored in an [`ExprArena`] with parallel `kinds`/`positions`
//! arrays and referenced by [`ExprId`].

use std::fmt;

use crate::{Pipeline, Pos};

/// Index into an [`ExprArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct ExprId(u32);

impl ExprId {
    /// Sentinel for "no expression".
    pub const INVALID: ExprId = ExprId(u32::MAX);

    #[inline]
    pub const fn new(index: u32) -> Self {
        ExprId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "ExprId({})", self.0)
        } else {
            write!(f, "ExprId::INVALID")
        }
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::INVALID
    }
}

/// The kind of an operand expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    /// The cursor `.`.
    Dot,
    /// The untyped `nil` constant.
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// String constant (unquoted contents).
    Str(String),
    /// `.a.b.c`: field chain rooted at dot, stored without the dots.
    Field(Vec<String>),
    /// `$x.a.b`: the first element is the variable name including `$`.
    Variable(Vec<String>),
    /// Bare identifier naming a function.
    Identifier(String),
    /// `(pipeline).a.b`: field chain rooted at another operand.
    Chain { base: ExprId, fields: Vec<String> },
    /// Parenthesised pipeline.
    Pipe(Box<Pipeline>),
}

impl ExprKind {
    /// Whether this operand is a literal constant.
    ///
    /// Literal arguments are checked against the declared parameter type
    /// before evaluation; every other operand is evaluated first.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            ExprKind::Nil | ExprKind::Bool(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_)
        )
    }
}

/// A single expression reconstructed from the arena.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

/// Flat storage for the expressions of one tree.
#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    kinds: Vec<ExprKind>,
    positions: Vec<Pos>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an expression, returning its ID.
    pub fn alloc(&mut self, kind: ExprKind, pos: Pos) -> ExprId {
        let index = u32::try_from(self.kinds.len()).unwrap_or(u32::MAX - 1);
        self.kinds.push(kind);
        self.positions.push(pos);
        ExprId::new(index)
    }

    #[inline]
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.kinds[id.index()]
    }

    #[inline]
    pub fn pos(&self, id: ExprId) -> Pos {
        self.positions.get(id.index()).copied().unwrap_or_default()
    }

    pub fn get(&self, id: ExprId) -> Expr {
        Expr {
            kind: self.kinds[id.index()].clone(),
            pos: self.pos(id),
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Render an expression the way it would be written in a template.
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { arena: self, id }
    }

    pub(crate) fn fmt_expr(&self, id: ExprId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind(id) {
            ExprKind::Dot => f.write_str("."),
            ExprKind::Nil => f.write_str("nil"),
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::Int(n) => write!(f, "{n}"),
            ExprKind::Float(x) => write!(f, "{x:?}"),
            ExprKind::Str(s) => write!(f, "{s:?}"),
            ExprKind::Field(idents) => {
                for ident in idents {
                    write!(f, ".{ident}")?;
                }
                Ok(())
            }
            ExprKind::Variable(idents) => f.write_str(&idents.join(".")),
            ExprKind::Identifier(name) => f.write_str(name),
            ExprKind::Chain { base, fields } => {
                if matches!(self.kind(*base), ExprKind::Pipe(_)) {
                    self.fmt_expr(*base, f)?;
                } else {
                    f.write_str("(")?;
                    self.fmt_expr(*base, f)?;
                    f.write_str(")")?;
                }
                for field in fields {
                    write!(f, ".{field}")?;
                }
                Ok(())
            }
            ExprKind::Pipe(pipe) => {
                f.write_str("(")?;
                pipe.fmt_with(self, f)?;
                f.write_str(")")
            }
        }
    }
}

/// [`fmt::Display`] adapter returned by [`ExprArena::display`].
pub struct ExprDisplay<'a> {
    arena: &'a ExprArena,
    id: ExprId,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.arena.fmt_expr(self.id, f)
    }
}
