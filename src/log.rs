//! Logging sinks for optimizer progress.
//!
//! The optimizer reports progress through a [`LogSink`], a print-like
//! contract: a list of text parts, a separator placed between them and a
//! terminator written after them. How much it reports is governed by the
//! verbosity level:
//!
//! | level | output |
//! |-------|--------|
//! | 0 | nothing |
//! | 1 | a progress dot per step and a termination line |
//! | 2 | per-step scores and the committed swap |
//! | 3 | full dumps of the current and best pairs |
//!
//! Structured diagnostics go to `tracing` regardless of the sink.

use std::io::Write;
use std::sync::{Arc, Mutex};

/// Destination for optimizer progress text.
///
/// Any `FnMut(&[&str], &str, &str) + Send` closure is a sink.
pub trait LogSink: Send {
    /// Writes `parts` joined by `sep`, followed by `end`.
    fn log(&mut self, parts: &[&str], sep: &str, end: &str);
}

impl<F> LogSink for F
where
    F: FnMut(&[&str], &str, &str) + Send,
{
    fn log(&mut self, parts: &[&str], sep: &str, end: &str) {
        self(parts, sep, end)
    }
}

fn render(parts: &[&str], sep: &str, end: &str) -> String {
    let mut text = parts.join(sep);
    text.push_str(end);
    text
}

/// Writes to standard output, flushing after every call so progress dots
/// appear immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn log(&mut self, parts: &[&str], sep: &str, end: &str) {
        // progress output is best-effort: write and flush errors are ignored
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(render(parts, sep, end).as_bytes());
        let _ = out.flush();
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn log(&mut self, _parts: &[&str], _sep: &str, _end: &str) {}
}

/// Buffers text until a line is complete, then emits it as a `tracing`
/// INFO event. A trailing partial line is emitted on drop.
#[derive(Debug, Default)]
pub struct TracingSink {
    pending: String,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for TracingSink {
    fn log(&mut self, parts: &[&str], sep: &str, end: &str) {
        self.pending.push_str(&render(parts, sep, end));
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            tracing::info!(target: "u_prepost", "{}", line.trim_end_matches('\n'));
        }
    }
}

impl Drop for TracingSink {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::info!(target: "u_prepost", "{}", self.pending);
        }
    }
}

/// Captures everything into a shared string. Clones share the buffer, so a
/// caller can keep one handle and hand another to the optimizer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    buffer: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything logged so far.
    pub fn contents(&self) -> String {
        match self.buffer.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn log(&mut self, parts: &[&str], sep: &str, end: &str) {
        let text = render(parts, sep, end);
        match self.buffer.lock() {
            Ok(mut buf) => buf.push_str(&text),
            Err(poisoned) => poisoned.into_inner().push_str(&text),
        }
    }
}
