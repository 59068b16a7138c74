use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use simpal_pty::LineSink;

use crate::selection::{SelectMode, Selection};

/// One line of the view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Line {
    pub text: String,
    /// `false` for diagnostics generated by the runner.
    #[serde(rename = "output")]
    pub is_output: bool,
}

#[derive(Default)]
struct ViewState {
    lines: Vec<Line>,
    selection: Selection,
}

/// Lines of a session plus the current selection, shared between the
/// session thread (the single writer) and any number of readers.
///
/// Lines and selection sit behind one lock, so appending, rendering and
/// copying never observe each other half-done.
#[derive(Default)]
pub struct LineBuffer {
    state: Mutex<ViewState>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic elsewhere cannot leave the line list inconsistent, so a
    // poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a line and return its index.
    pub fn push(&self, text: String, is_output: bool) -> usize {
        let mut state = self.lock();
        state.lines.push(Line { text, is_output });
        state.lines.len() - 1
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    pub fn line(&self, index: usize) -> Option<Line> {
        self.lock().lines.get(index).cloned()
    }

    /// Read lines and selection together, holding the lock for the duration
    /// of `f`. Appends wait until `f` returns.
    pub fn with_lines<R>(&self, f: impl FnOnce(&[Line], &Selection) -> R) -> R {
        let state = self.lock();
        f(&state.lines, &state.selection)
    }

    /// Apply a click on line `index`. Returns `false` if there is no such
    /// line yet.
    pub fn select(&self, index: usize, mode: SelectMode) -> bool {
        let mut state = self.lock();
        if index >= state.lines.len() {
            return false;
        }
        state.selection.apply(index, mode);
        true
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.lock().selection.contains(index)
    }

    pub fn selection(&self) -> Selection {
        self.lock().selection.clone()
    }

    pub fn clear_selection(&self) {
        self.lock().selection.clear();
    }

    /// Text to put on the clipboard: every selected line, in order, each
    /// followed by a newline. `None` when nothing is selected.
    pub fn selected_text(&self) -> Option<String> {
        let state = self.lock();
        let text: String = state
            .selection
            .indices()
            .filter_map(|i| state.lines.get(i))
            .map(|line| format!("{}\n", line.text))
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

impl LineSink for LineBuffer {
    fn add_line(&self, text: String, is_output: bool) {
        self.push(text, is_output);
    }
}
