//! Quill IR - syntax tree types for the Quill template engine.
//!
//! The executor in `quill_eval` walks these trees. Trees are assembled
//! programmatically through [`TreeBuilder`]; this crate deliberately has no
//! lexer or parser.
//!
//! # Layout
//!
//! - Expressions (the operands of a command) live in a flat [`ExprArena`] and
//!   are referenced by [`ExprId`]. Evaluation contexts borrow argument lists
//!   as `&[ExprId]` slices straight out of the tree.
//! - Statements ([`Node`]) form an ordinary owned tree: text, actions,
//!   `if`/`with`/`range` branches and named template invocations.
//! - [`Pos`] is a 1-based line/column pair used only for diagnostics.

mod expr;
mod node;
mod pos;
mod tree;

pub use expr::{Expr, ExprArena, ExprDisplay, ExprId, ExprKind};
pub use node::{Branch, Command, Node, NodeRef, Pipeline, PipelineDisplay};
pub use pos::Pos;
pub use tree::{Tree, TreeBuilder};
