//! Platform backends.
//!
//! Both backends allocate the PTY through `portable-pty`; they differ in the
//! interpreter that runs the command string. [`NativeBackend`] names the one
//! matching the build target, so the runner is monomorphized over it and no
//! backend choice happens at runtime.

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::config::{PtyGeometry, SessionConfig};
use crate::pty::{PortablePty, PtyError, PtyHandle};

/// The backend for the platform this crate was built for.
#[cfg(windows)]
pub type NativeBackend = ConsoleBackend;

/// The backend for the platform this crate was built for.
#[cfg(not(windows))]
pub type NativeBackend = UnixBackend;

/// A program invocation, independent of any PTY library.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Overrides applied on top of the inherited environment.
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable, replacing an earlier override of `key`.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.env.push((key, value)),
        }
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The value this command sets for `key`, if any.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A way to allocate a PTY and run a command string inside it.
pub trait SessionBackend {
    type Pty: PtyHandle;

    /// Allocate a PTY. Nothing is spawned yet.
    fn open(&self, geometry: PtyGeometry) -> Result<Self::Pty, PtyError>;

    /// The interpreter invocation that executes `command` verbatim.
    fn shell_command(&self, command: &str) -> ShellCommand;

    /// Whether the output stream stays open after the child exits until the
    /// PTY itself is closed.
    fn close_after_exit(&self) -> bool {
        false
    }
}

/// POSIX backend: `<shell> -c <command>`.
///
/// The default interpreter is `bash` from `PATH`, or `/bin/sh` when no
/// `bash` is installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnixBackend {
    shell: String,
}

impl UnixBackend {
    pub const DEFAULT_SHELL: &'static str = "bash";
    pub const FALLBACK_SHELL: &'static str = "/bin/sh";

    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        config
            .shell
            .as_deref()
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for UnixBackend {
    fn default() -> Self {
        let path = std::env::var_os("PATH");
        let shell = find_in_path(Self::DEFAULT_SHELL, path.as_deref())
            .map(|found| found.to_string_lossy().into_owned())
            .unwrap_or_else(|| Self::FALLBACK_SHELL.to_string());
        Self::new(shell)
    }
}

/// First file named `program` in the directories of `path`.
fn find_in_path(program: &str, path: Option<&OsStr>) -> Option<PathBuf> {
    std::env::split_paths(path?)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

impl SessionBackend for UnixBackend {
    type Pty = PortablePty;

    fn open(&self, geometry: PtyGeometry) -> Result<PortablePty, PtyError> {
        PortablePty::open(geometry)
    }

    fn shell_command(&self, command: &str) -> ShellCommand {
        ShellCommand::new(&self.shell).arg("-c").arg(command)
    }
}

/// Windows console backend: PowerShell under ConPTY.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleBackend {
    shell: String,
}

impl ConsoleBackend {
    pub const DEFAULT_SHELL: &'static str =
        r"C:\WINDOWS\System32\WindowsPowerShell\v1.0\powershell.exe";

    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        config
            .shell
            .as_deref()
            .map(Self::new)
            .unwrap_or_default()
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ConsoleBackend {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHELL)
    }
}

impl SessionBackend for ConsoleBackend {
    type Pty = PortablePty;

    fn open(&self, geometry: PtyGeometry) -> Result<PortablePty, PtyError> {
        PortablePty::open(geometry)
    }

    // No `-NoExit`: the session has to end when the command does.
    fn shell_command(&self, command: &str) -> ShellCommand {
        ShellCommand::new(&self.shell)
            .arg("-NoLogo")
            .arg("-NonInteractive")
            .arg("-Command")
            .arg(command)
    }

    // ConPTY keeps the output pipe open until the pseudoconsole is closed.
    fn close_after_exit(&self) -> bool {
        true
    }
}
