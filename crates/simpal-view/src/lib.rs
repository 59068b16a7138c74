//! simpal-view: the display-side state of a simpal session.
//!
//! Holds the lines a session has produced and which of them are selected.
//! Rendering, key handling and the clipboard belong to the host; this crate
//! only keeps the state they share with the session thread consistent.

pub mod buffer;
pub mod selection;

pub use buffer::{Line, LineBuffer};
pub use selection::{SelectMode, Selection};
