//! Output pump that drains a session's lines into the view and stdout.
//!
//! The pump runs on the tokio runtime while the session reads the PTY on its
//! own thread. It stops when the session ends (its channel closes) or when
//! the shutdown future resolves, e.g. on Ctrl-C.

use std::future::Future;
use std::io::{self, Write};

use simpal_view::{Line, LineBuffer, SelectMode};
use tokio::sync::mpsc;

use crate::cli::LineRange;
use crate::ipc::ViewEvent;

/// How lines are written to stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Json,
    Quiet,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (true, _) => OutputMode::Quiet,
            (false, true) => OutputMode::Json,
            (false, false) => OutputMode::Plain,
        }
    }
}

/// Why the pump returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PumpExit {
    /// The session ended and every line was delivered.
    Ended,
    /// Shutdown was requested while the session was still running.
    Interrupted,
}

/// Drain `rx` into `buffer`, echoing each line to `out`.
pub async fn run_pump<W, F>(
    mut rx: mpsc::UnboundedReceiver<Line>,
    buffer: &LineBuffer,
    mode: OutputMode,
    out: &mut W,
    shutdown: F,
) -> io::Result<PumpExit>
where
    W: Write,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) => {
                    write_line(out, &line, mode)?;
                    buffer.push(line.text, line.is_output);
                }
                None => break,
            },
            _ = &mut shutdown => return Ok(PumpExit::Interrupted),
        }
    }

    if mode == OutputMode::Json {
        write_event(out, &ViewEvent::Ended { lines: buffer.len() })?;
    }
    Ok(PumpExit::Ended)
}

fn write_line<W: Write>(out: &mut W, line: &Line, mode: OutputMode) -> io::Result<()> {
    match mode {
        OutputMode::Plain => {
            writeln!(out, "{}", line.text)?;
            out.flush()
        }
        OutputMode::Json => write_event(out, &ViewEvent::Line(line.clone())),
        OutputMode::Quiet => Ok(()),
    }
}

fn write_event<W: Write>(out: &mut W, event: &ViewEvent) -> io::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    out.flush()
}

/// Select every existing line covered by `ranges`. Ranges past the end of
/// the buffer are ignored.
pub fn select_ranges(buffer: &LineBuffer, ranges: &[LineRange]) {
    buffer.clear_selection();
    for range in ranges {
        for index in range.indices() {
            if index >= buffer.len() {
                break;
            }
            if !buffer.is_selected(index) {
                buffer.select(index, SelectMode::Toggle);
            }
        }
    }
}

/// Write the buffer's copy text, if anything is selected.
pub fn write_selection<W: Write>(
    out: &mut W,
    buffer: &LineBuffer,
    mode: OutputMode,
) -> io::Result<()> {
    let Some(text) = buffer.selected_text() else {
        return Ok(());
    };
    match mode {
        OutputMode::Json => write_event(out, &ViewEvent::Selection { text }),
        OutputMode::Plain | OutputMode::Quiet => {
            out.write_all(text.as_bytes())?;
            out.flush()
        }
    }
}
