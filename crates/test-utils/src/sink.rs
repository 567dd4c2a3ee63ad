use std::sync::{Arc, Mutex};

use fleetrun::exec::output::{format_line, OutputSink};

/// Sink that records every emitted line, already formatted as
/// `[unit] line`.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Lines emitted by one unit, without the `[unit] ` prefix.
    pub fn lines_for(&self, unit: &str) -> Vec<String> {
        let prefix = format!("[{unit}] ");
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, unit: &str, line: &str) {
        self.lines.lock().unwrap().push(format_line(unit, line));
    }
}
