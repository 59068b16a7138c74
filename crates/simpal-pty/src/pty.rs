use std::io::Read;

use portable_pty::{
    native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize, SlavePty,
};
use thiserror::Error;

use crate::backend::ShellCommand;
use crate::config::PtyGeometry;

/// Errors from PTY operations.
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to open PTY: {0}")]
    Open(String),

    #[error("failed to spawn command: {0}")]
    Spawn(String),

    #[error("PTY resize failed: {0}")]
    Resize(String),

    #[error("failed to clone PTY reader: {0}")]
    Reader(String),

    #[error("{0}")]
    Wait(String),

    #[error("PTY is closed")]
    Closed,
}

/// One allocated pseudo-terminal and the child process attached to it.
///
/// Dropping the handle releases the PTY. The runner owns exactly one handle
/// per session, so every exit path releases it exactly once.
pub trait PtyHandle {
    /// Start `command` attached to the PTY's slave side.
    fn spawn(&mut self, command: ShellCommand) -> Result<(), PtyError>;

    /// Resize the PTY.
    fn resize(&self, geometry: PtyGeometry) -> Result<(), PtyError>;

    /// A blocking reader over the child's output.
    fn take_reader(&mut self) -> Result<Box<dyn Read + Send>, PtyError>;

    /// Block until the child exits and return its exit code.
    fn wait(&mut self) -> Result<u32, PtyError>;

    /// The child's exit code if it has exited, without blocking.
    fn try_wait(&mut self) -> Result<Option<u32>, PtyError>;

    /// Close the controlling side of the PTY. The child stays attached and
    /// can still be waited on; readers see end of stream once the PTY has
    /// flushed.
    fn close(&mut self);
}

impl From<PtyGeometry> for PtySize {
    fn from(geometry: PtyGeometry) -> Self {
        PtySize {
            rows: geometry.rows,
            cols: geometry.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// [`PtyHandle`] over the platform's native PTY, via `portable-pty`.
pub struct PortablePty {
    master: Option<Box<dyn MasterPty + Send>>,
    slave: Option<Box<dyn SlavePty + Send>>,
    child: Option<Box<dyn Child + Send + Sync>>,
}

impl PortablePty {
    /// Allocate a new PTY with the given dimensions. No process is started.
    pub fn open(geometry: PtyGeometry) -> Result<Self, PtyError> {
        let pair = native_pty_system()
            .openpty(geometry.into())
            .map_err(|e| PtyError::Open(e.to_string()))?;

        Ok(Self {
            master: Some(pair.master),
            slave: Some(pair.slave),
            child: None,
        })
    }

    /// OS process id of the child, once spawned.
    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.process_id())
    }
}

impl PtyHandle for PortablePty {
    fn spawn(&mut self, command: ShellCommand) -> Result<(), PtyError> {
        let slave = self
            .slave
            .take()
            .ok_or_else(|| PtyError::Spawn("a command was already spawned on this PTY".into()))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &command.cwd {
            cmd.cwd(cwd);
        }

        let child = slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        // The master only reports end of stream once no slave descriptor is
        // left open in this process.
        drop(slave);

        log::debug!(
            "spawned {} (pid {:?})",
            command.program,
            child.process_id()
        );
        self.child = Some(child);
        Ok(())
    }

    fn resize(&self, geometry: PtyGeometry) -> Result<(), PtyError> {
        self.master
            .as_ref()
            .ok_or(PtyError::Closed)?
            .resize(geometry.into())
            .map_err(|e| PtyError::Resize(e.to_string()))
    }

    fn take_reader(&mut self) -> Result<Box<dyn Read + Send>, PtyError> {
        self.master
            .as_ref()
            .ok_or(PtyError::Closed)?
            .try_clone_reader()
            .map_err(|e| PtyError::Reader(e.to_string()))
    }

    fn wait(&mut self) -> Result<u32, PtyError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| PtyError::Wait("no process was spawned".into()))?;
        let status = child.wait().map_err(|e| PtyError::Wait(e.to_string()))?;
        Ok(status.exit_code())
    }

    fn try_wait(&mut self) -> Result<Option<u32>, PtyError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| PtyError::Wait("no process was spawned".into()))?;
        let status = child.try_wait().map_err(|e| PtyError::Wait(e.to_string()))?;
        Ok(status.map(|status| status.exit_code()))
    }

    fn close(&mut self) {
        if self.master.take().is_some() {
            log::debug!("closed PTY master");
        }
    }
}

impl Drop for PortablePty {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if let Ok(None) = child.try_wait() {
                log::debug!("killing child {:?} still attached to PTY", child.process_id());
                let _ = child.kill();
                let _ = child.wait();
            }
        }
        log::debug!("released PTY");
    }
}
