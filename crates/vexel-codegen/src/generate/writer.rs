//! Indentation-aware source buffer

use std::fmt::Write as _;

const INDENT: &str = "  ";

pub(crate) struct SourceWriter {
    buf: String,
    depth: usize,
}

impl SourceWriter {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
            depth: 0,
        }
    }

    pub(crate) fn line(&mut self, text: impl AsRef<str>) {
        for _ in 0..self.depth {
            self.buf.push_str(INDENT);
        }
        // Writing into a String cannot fail.
        let _ = writeln!(self.buf, "{}", text.as_ref());
    }

    /// Write `header` and open a brace block on the next line.
    pub(crate) fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.line("{");
        self.depth += 1;
    }

    pub(crate) fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    pub(crate) fn blank(&mut self) {
        self.buf.push('\n');
    }

    pub(crate) fn finish(self) -> String {
        self.buf
    }
}
