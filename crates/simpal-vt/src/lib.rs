//! simpal-vt: terminal control-sequence handling for simpal.
//!
//! simpal never emulates a terminal. Output from the child process is shown
//! as plain text, so this crate only has to remove the escape sequences a
//! program emits even when `TERM=dumb` is set.

pub mod sanitize;

pub use sanitize::{contains_escape, sanitize};
