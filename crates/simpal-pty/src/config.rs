use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How long a session waits before spawning, so the consumer is ready to
/// receive the first line.
pub const STARTUP_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// `TERM` value given to every child process.
pub const DEFAULT_TERM: &str = "dumb";

/// PTY dimensions in character cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PtyGeometry {
    pub cols: u16,
    pub rows: u16,
}

impl PtyGeometry {
    /// Wide enough that programs almost never wrap a line themselves.
    pub const FIXED: Self = Self::new(1000, 48);

    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

impl Default for PtyGeometry {
    fn default() -> Self {
        Self::FIXED
    }
}

/// Per-session settings.
///
/// The PTY geometry and `TERM` are not configurable: every session uses
/// [`PtyGeometry::FIXED`] and [`DEFAULT_TERM`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub startup_delay_ms: u64,
    /// Interpreter override; `None` uses the backend's default.
    pub shell: Option<String>,
}

impl SessionConfig {
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    /// Same settings without the startup grace period.
    pub fn without_delay(mut self) -> Self {
        self.startup_delay_ms = 0;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: STARTUP_GRACE_PERIOD.as_millis() as u64,
            shell: None,
        }
    }
}
