//! simpal-pty: runs one shell command inside a pseudo-terminal and streams
//! its output, line by line, to a consumer.
//!
//! # Architecture
//!
//! - [`SessionBackend`] — Platform backend: allocates a PTY and knows which
//!   interpreter runs a command string. [`NativeBackend`] is picked at build
//!   time.
//! - [`PtyHandle`] — One allocated PTY plus its child. Released on drop.
//! - [`LineReader`] — Splits the PTY byte stream into lines.
//! - [`run`] / [`start_session`] — The session body and its fire-and-forget
//!   launcher. Every line, output or diagnostic, goes to a [`LineSink`].

pub mod backend;
pub mod config;
pub mod lines;
pub mod pty;
pub mod session;

pub use backend::{ConsoleBackend, NativeBackend, SessionBackend, ShellCommand, UnixBackend};
pub use config::{PtyGeometry, SessionConfig, DEFAULT_TERM, STARTUP_GRACE_PERIOD};
pub use lines::LineReader;
pub use pty::{PortablePty, PtyError, PtyHandle};
pub use session::{run, start_session, start_session_with, LineSink};
