//! Output sink for template rendering.
//!
//! Rendering appends to an [`OutputBuffer`]. Each template invocation
//! records a mark on entry so `{{return}}` can truncate back to the
//! invocation's first byte and replace its output.
//!
//! Uses enum dispatch rather than trait objects, like the rest of the
//! executor's hot paths.

use std::fmt;

/// Captures rendered text into a string.
#[derive(Default, Debug)]
pub struct BufferSink {
    buffer: String,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print(&mut self, msg: &str) {
        self.buffer.push_str(msg);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn truncate(&mut self, mark: usize) {
        if mark <= self.buffer.len() && self.buffer.is_char_boundary(mark) {
            self.buffer.truncate(mark);
        }
    }

    pub fn into_output(self) -> String {
        self.buffer
    }
}

/// Output destination for a render.
#[derive(Debug)]
pub enum OutputBuffer {
    /// Captures output.
    Buffer(BufferSink),
    /// Discards output; used when only the side effects of a render matter.
    Silent,
}

impl OutputBuffer {
    pub fn buffer() -> Self {
        OutputBuffer::Buffer(BufferSink::new())
    }

    pub fn print(&mut self, msg: &str) {
        match self {
            Self::Buffer(b) => b.print(msg),
            Self::Silent => {}
        }
    }

    /// Current length; pass to [`OutputBuffer::truncate`] to roll back.
    pub fn mark(&self) -> usize {
        match self {
            Self::Buffer(b) => b.len(),
            Self::Silent => 0,
        }
    }

    /// Discard everything written after `mark`.
    pub fn truncate(&mut self, mark: usize) {
        match self {
            Self::Buffer(b) => b.truncate(mark),
            Self::Silent => {}
        }
    }

    pub fn into_output(self) -> String {
        match self {
            Self::Buffer(b) => b.into_output(),
            Self::Silent => String::new(),
        }
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::buffer()
    }
}

impl fmt::Write for OutputBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}
