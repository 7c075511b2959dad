//! Variable scope for template execution.
//!
//! Variables live on a single stack. Blocks (`if`, `with`, `range`
//! iterations) take a [`Mark`] on entry and pop back to it on exit, so
//! declarations never leak out of the block that made them. Index 0 is
//! always `$`, the data the template was executed with.

use quill_value::{MapValue, Value};

/// Error returned by [`Environment::assign`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignError {
    /// Variable not declared in any enclosing block.
    Undefined,
}

/// Stack position returned by [`Environment::mark`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mark(usize);

#[derive(Clone, Debug)]
struct Variable {
    name: String,
    value: Value,
}

/// The variable stack of one template invocation.
#[derive(Clone, Debug)]
pub struct Environment {
    vars: Vec<Variable>,
}

impl Environment {
    /// Start a scope whose `$` is `dot`.
    pub fn new(dot: Value) -> Self {
        Environment {
            vars: vec![Variable {
                name: "$".to_string(),
                value: dot,
            }],
        }
    }

    #[inline]
    pub fn mark(&self) -> Mark {
        Mark(self.vars.len())
    }

    /// Drop every variable declared since `mark`.
    pub fn pop(&mut self, mark: Mark) {
        self.vars.truncate(mark.0.max(1));
    }

    /// Declare a variable in the current block.
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.vars.push(Variable {
            name: name.into(),
            value,
        });
    }

    /// Overwrite the `n`-th variable from the top (1-based).
    ///
    /// Used by `range` to rebind its declared variables each iteration.
    pub fn set_top(&mut self, n: usize, value: Value) {
        if let Some(index) = self.vars.len().checked_sub(n) {
            if index > 0 {
                self.vars[index].value = value;
            }
        }
    }

    /// Assign to the innermost visible variable called `name`.
    pub fn assign(&mut self, name: &str, value: Value) -> Result<(), AssignError> {
        let var = self
            .vars
            .iter_mut()
            .rev()
            .find(|v| v.name == name)
            .ok_or(AssignError::Undefined)?;
        var.value = value;
        Ok(())
    }

    /// Look up the innermost visible variable called `name`.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars
            .iter()
            .rev()
            .find(|v| v.name == name)
            .map(|v| &v.value)
    }

    /// The value of `$`.
    pub fn global(&self) -> &Value {
        &self.vars[0].value
    }

    /// Every declared variable except `$`, innermost binding winning.
    pub fn variables(&self) -> MapValue {
        let mut map = MapValue::new();
        for var in &self.vars[1..] {
            map.insert(var.name.clone(), var.value.clone());
        }
        map
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Always false: `$` is never popped.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
