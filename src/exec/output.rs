// src/exec/output.rs

//! Output multiplexing.
//!
//! Every unit's stdout and stderr are read line by line and republished as
//! `[unit] line` to one shared [`OutputSink`]. Lines of one stream keep
//! their order; lines from different units (and from a unit's stdout vs its
//! stderr) interleave as they arrive.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, warn};

use crate::errors::{FleetError, Result};
use crate::exec::process::ProcessOutput;

/// Destination for multiplexed unit output.
///
/// Implementations must write each line atomically with respect to other
/// lines; `emit` is called concurrently from every unit's task.
pub trait OutputSink: Send + Sync {
    fn emit(&self, unit: &str, line: &str);
}

/// The `[unit] line` form written by every sink.
pub fn format_line(unit: &str, line: &str) -> String {
    format!("[{unit}] {line}")
}

/// Writes to the process's STDOUT. Logs stay on STDERR.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&self, unit: &str, line: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout (e.g. `| head`) must not take the supervisor down.
        let _ = writeln!(out, "{}", format_line(unit, line));
    }
}

/// Drain both pipes of one process into the sink.
///
/// Returns once both streams reached EOF, i.e. after the last byte the
/// process wrote has been emitted. Read failures are logged and end only the
/// affected stream.
pub async fn multiplex(unit: &str, output: ProcessOutput, sink: &dyn OutputSink) -> usize {
    let ProcessOutput { stdout, stderr } = output;

    let stdout = async move {
        match stdout {
            Some(reader) => pump_or_warn(unit, reader, sink).await,
            None => 0,
        }
    };
    let stderr = async move {
        match stderr {
            Some(reader) => pump_or_warn(unit, reader, sink).await,
            None => 0,
        }
    };

    let (out_lines, err_lines) = tokio::join!(stdout, stderr);
    debug!(unit, out_lines, err_lines, "unit output drained");
    out_lines + err_lines
}

async fn pump_or_warn<R>(unit: &str, reader: R, sink: &dyn OutputSink) -> usize
where
    R: AsyncRead + Unpin,
{
    match pump_lines(unit, reader, sink).await {
        Ok(n) => n,
        Err(err) => {
            warn!(unit, error = %err, "stopped reading unit output");
            0
        }
    }
}

/// Emit every line of `reader` to `sink`, including a final line without a
/// trailing newline. Invalid UTF-8 is replaced, not rejected.
pub async fn pump_lines<R>(unit: &str, reader: R, sink: &dyn OutputSink) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut emitted = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| FleetError::Stream {
                unit: unit.to_string(),
                source,
            })?;
        if n == 0 {
            break;
        }

        let line = trim_line_ending(&buf);
        sink.emit(unit, &String::from_utf8_lossy(line));
        emitted += 1;
    }

    Ok(emitted)
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}
