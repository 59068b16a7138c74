//! Transport between the session thread and the output pump.
//!
//! The session thread only sees a [`ChannelSink`]; the pump owns the
//! receiving end. JSON output uses [`ViewEvent`], serialized as tagged JSON.

use serde::Serialize;
use simpal_pty::LineSink;
use simpal_view::Line;
use tokio::sync::mpsc;

/// Events printed in `--json` mode, one JSON object per line.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// A line from the session, output or diagnostic.
    Line(Line),
    /// The copy text of the lines picked with `--select`.
    Selection { text: String },
    /// The session's output stream ended.
    Ended { lines: usize },
}

/// [`LineSink`] that forwards lines to the pump.
///
/// Dropped together with the session, which closes the channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Line>,
}

impl LineSink for ChannelSink {
    fn add_line(&self, text: String, is_output: bool) {
        // The receiver is gone only once the app is shutting down.
        let _ = self.tx.send(Line { text, is_output });
    }
}

pub fn channel() -> (ChannelSink, mpsc::UnboundedReceiver<Line>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}
