//! Source positions for diagnostics.

use std::fmt;

/// Line/column position of a node in its template source.
///
/// Both coordinates are 1-based. [`Pos::DUMMY`] marks nodes built without
/// position information; diagnostics omit the coordinates for those.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    /// Position for nodes that were built without source information.
    pub const DUMMY: Pos = Pos { line: 0, col: 0 };

    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }

    #[inline]
    pub const fn is_dummy(self) -> bool {
        self.line == 0 && self.col == 0
    }

    /// `self` unless it is dummy, in which case `other`.
    #[inline]
    #[must_use]
    pub const fn or(self, other: Pos) -> Pos {
        if self.is_dummy() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}
