//! Call-stack tracking for function and method invocations.
//!
//! The executor pushes a [`CallFrame`] before invoking a callable and pops it
//! once the call (and any recovery attempt) has finished. Error-manager
//! handlers read it through [`crate::Context::stack_peek`] to learn who
//! called them, e.g. whether a failing call sits directly under `trap`.

use std::sync::Arc;

use quill_value::errors::depth_exceeded;
use quill_value::EvalError;

use crate::Signature;

/// A single frame in the live call stack.
#[derive(Clone, Debug)]
pub struct CallFrame {
    /// Function or method name as written in the template.
    pub name: String,
    /// Declared shape of the callable being invoked.
    pub signature: Arc<Signature>,
}

impl CallFrame {
    pub fn new(name: impl Into<String>, signature: Arc<Signature>) -> Self {
        CallFrame {
            name: name.into(),
            signature,
        }
    }
}

/// Live call stack for one render.
///
/// The depth check is integrated into `push()`; a render never shares its
/// stack with another.
#[derive(Clone, Debug)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: Option<usize>,
}

impl CallStack {
    /// `max_depth` is `None` for an unbounded stack.
    pub fn new(max_depth: Option<usize>) -> Self {
        CallStack {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Push a call frame, checking the depth limit.
    ///
    /// The frame is NOT pushed on overflow.
    pub fn push(&mut self, frame: CallFrame) -> Result<(), EvalError> {
        if let Some(max) = self.max_depth {
            if self.frames.len() >= max {
                return Err(depth_exceeded(max));
            }
        }
        self.frames.push(frame);
        Ok(())
    }

    /// Pop the most recent call frame.
    pub fn pop(&mut self) -> Option<CallFrame> {
        debug_assert!(
            !self.frames.is_empty(),
            "CallStack::pop() called on empty stack"
        );
        self.frames.pop()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    /// The frame `n` calls back from the top; `peek(0)` is the current one.
    pub fn peek(&self, n: usize) -> Option<&CallFrame> {
        let index = self.frames.len().checked_sub(n + 1)?;
        self.frames.get(index)
    }

    /// Frame names, most recent call first.
    pub fn names(&self) -> Vec<&str> {
        self.frames.iter().rev().map(|f| f.name.as_str()).collect()
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new(None)
    }
}
