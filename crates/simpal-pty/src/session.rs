use std::io::{self, Read};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use simpal_vt::sanitize;

use crate::backend::{NativeBackend, SessionBackend};
use crate::config::{PtyGeometry, SessionConfig, DEFAULT_TERM};
use crate::lines::LineReader;
use crate::pty::PtyHandle;

/// How often a session whose output outlives the child checks for exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receiver of every line a session produces.
///
/// `is_output` is `true` for child output and `false` for diagnostics the
/// runner generates itself. Sessions call this from their own thread, so
/// implementations must tolerate being called while the host reads the same
/// state.
pub trait LineSink: Send + Sync {
    fn add_line(&self, text: String, is_output: bool);
}

impl<T: LineSink + ?Sized> LineSink for Arc<T> {
    fn add_line(&self, text: String, is_output: bool) {
        (**self).add_line(text, is_output)
    }
}

impl<T: LineSink + ?Sized> LineSink for Box<T> {
    fn add_line(&self, text: String, is_output: bool) {
        (**self).add_line(text, is_output)
    }
}

/// Run `command` in a fresh PTY and deliver its output to `sink`.
///
/// Blocks until the child's output stream ends. Failures never escape: each
/// one becomes a single diagnostic line and ends the session. The PTY handle
/// lives in this frame, so it is released exactly once on every path.
pub fn run<B, S>(backend: &B, sink: &S, command: &str, config: &SessionConfig)
where
    B: SessionBackend + ?Sized,
    S: LineSink + ?Sized,
{
    let delay = config.startup_delay();
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }

    let geometry = PtyGeometry::FIXED;
    let mut pty = match backend.open(geometry) {
        Ok(pty) => pty,
        Err(e) => {
            log::warn!("PTY allocation failed: {e}");
            sink.add_line(format!("Error starting pty: {e}"), false);
            return;
        }
    };

    let mut shell = backend.shell_command(command).env("TERM", DEFAULT_TERM);
    if let Ok(path) = std::env::var("PATH") {
        shell = shell.env("PATH", path);
    }
    if let Ok(cwd) = std::env::current_dir() {
        shell = shell.cwd(cwd);
    }

    if let Err(e) = pty.spawn(shell) {
        log::warn!("spawn failed for {command:?}: {e}");
        sink.add_line(format!("Error spawning command: {e}"), false);
        return;
    }

    if let Err(e) = pty.resize(geometry) {
        log::warn!("{e}");
    }

    let reader = match pty.take_reader() {
        Ok(reader) => reader,
        Err(e) => {
            sink.add_line(format!("Error starting pty: {e}"), false);
            return;
        }
    };

    let delivered = if backend.close_after_exit() {
        match deliver_until_exit(&mut pty, reader, sink) {
            Ok(delivered) => delivered,
            Err(e) => {
                sink.add_line(format!("Error starting pty: {e}"), false);
                return;
            }
        }
    } else {
        deliver(reader, sink)
    };

    match pty.wait() {
        Ok(code) => log::debug!("{command:?} exited with {code} after {delivered} lines"),
        Err(e) => sink.add_line(format!("Error waiting for process: {e}"), false),
    }
}

fn deliver<S>(reader: Box<dyn Read + Send>, sink: &S) -> usize
where
    S: LineSink + ?Sized,
{
    let mut delivered = 0usize;
    for line in LineReader::new(reader) {
        sink.add_line(sanitize(&line), true);
        delivered += 1;
    }
    delivered
}

/// Deliver lines read on a helper thread, closing the PTY once the child has
/// exited so the stream can reach its end.
fn deliver_until_exit<P, S>(
    pty: &mut P,
    reader: Box<dyn Read + Send>,
    sink: &S,
) -> io::Result<usize>
where
    P: PtyHandle,
    S: LineSink + ?Sized,
{
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("pty-reader".into())
        .spawn(move || {
            for line in LineReader::new(reader) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;

    let mut delivered = 0usize;
    let mut closed = false;
    loop {
        match rx.recv_timeout(EXIT_POLL_INTERVAL) {
            Ok(line) => {
                sink.add_line(sanitize(&line), true);
                delivered += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if !closed && !matches!(pty.try_wait(), Ok(None)) {
                    log::debug!("child exited, closing PTY to end its output");
                    pty.close();
                    closed = true;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(delivered)
}

/// Start `command` on the native backend with the default session settings.
///
/// Returns immediately; everything the session produces arrives at `sink`.
pub fn start_session<S>(sink: S, command: impl Into<String>)
where
    S: LineSink + 'static,
{
    let config = SessionConfig::default();
    start_session_with(NativeBackend::from_config(&config), sink, command, config);
}

/// Start `command` on its own thread with an explicit backend and settings.
///
/// The sink is dropped when the session ends, so a channel-backed sink sees
/// the end of the session as its channel closing.
pub fn start_session_with<B, S>(
    backend: B,
    sink: S,
    command: impl Into<String>,
    config: SessionConfig,
) where
    B: SessionBackend + Send + 'static,
    S: LineSink + 'static,
{
    let command = command.into();
    let sink = Arc::new(sink);
    let session_sink = Arc::clone(&sink);

    let spawned = std::thread::Builder::new()
        .name("pty-session".into())
        .spawn(move || {
            run(&backend, &*session_sink, &command, &config);
        });

    if let Err(e) = spawned {
        log::error!("failed to spawn session thread: {e}");
        sink.add_line(format!("Error starting session: {e}"), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    use crate::backend::ShellCommand;
    use crate::config::PtyGeometry;
    use crate::pty::PtyError;

    /// Collects every delivered line.
    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, bool)>>);

    impl LineSink for Collect {
        fn add_line(&self, text: String, is_output: bool) {
            self.0.lock().unwrap().push((text, is_output));
        }
    }

    impl Collect {
        fn lines(&self) -> Vec<(String, bool)> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Forwards lines over a channel; dropping it closes the channel.
    struct Forward(Mutex<mpsc::Sender<(String, bool)>>);

    impl LineSink for Forward {
        fn add_line(&self, text: String, is_output: bool) {
            let _ = self.0.lock().unwrap().send((text, is_output));
        }
    }

    #[derive(Default, Clone)]
    struct Counters {
        releases: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        opened: Arc<Mutex<Vec<PtyGeometry>>>,
        spawned: Arc<Mutex<Option<ShellCommand>>>,
        resized: Arc<Mutex<Vec<PtyGeometry>>>,
    }

    #[derive(Default)]
    struct FakeBackend {
        fail_open: bool,
        fail_spawn: bool,
        fail_reader: bool,
        fail_wait: bool,
        /// Output stays open after the child exits until the PTY is closed.
        close_after_exit: bool,
        output: Vec<u8>,
        counters: Counters,
    }

    struct FakePty {
        fail_spawn: bool,
        fail_reader: bool,
        fail_wait: bool,
        close_after_exit: bool,
        output: Vec<u8>,
        writer: Option<mpsc::Sender<Vec<u8>>>,
        counters: Counters,
    }

    /// Reads chunks until every sender is gone, like a console pipe whose
    /// write end belongs to the PTY.
    struct PipeReader {
        rx: mpsc::Receiver<Vec<u8>>,
        pending: Cursor<Vec<u8>>,
    }

    impl Read for PipeReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            loop {
                let n = self.pending.read(buf)?;
                if n > 0 {
                    return Ok(n);
                }
                match self.rx.recv() {
                    Ok(chunk) => self.pending = Cursor::new(chunk),
                    Err(_) => return Ok(0),
                }
            }
        }
    }

    impl SessionBackend for FakeBackend {
        type Pty = FakePty;

        fn open(&self, geometry: PtyGeometry) -> Result<FakePty, PtyError> {
            if self.fail_open {
                return Err(PtyError::Open("out of ptys".into()));
            }
            self.counters.opened.lock().unwrap().push(geometry);
            Ok(FakePty {
                fail_spawn: self.fail_spawn,
                fail_reader: self.fail_reader,
                fail_wait: self.fail_wait,
                close_after_exit: self.close_after_exit,
                output: self.output.clone(),
                writer: None,
                counters: self.counters.clone(),
            })
        }

        fn shell_command(&self, command: &str) -> ShellCommand {
            ShellCommand::new("fake-sh").arg("-c").arg(command)
        }

        fn close_after_exit(&self) -> bool {
            self.close_after_exit
        }
    }

    impl PtyHandle for FakePty {
        fn spawn(&mut self, command: ShellCommand) -> Result<(), PtyError> {
            if self.fail_spawn {
                return Err(PtyError::Spawn("no such interpreter".into()));
            }
            *self.counters.spawned.lock().unwrap() = Some(command);
            Ok(())
        }

        fn resize(&self, geometry: PtyGeometry) -> Result<(), PtyError> {
            self.counters.resized.lock().unwrap().push(geometry);
            Ok(())
        }

        fn take_reader(&mut self) -> Result<Box<dyn Read + Send>, PtyError> {
            if self.fail_reader {
                return Err(PtyError::Reader("closed".into()));
            }
            let output = std::mem::take(&mut self.output);
            if !self.close_after_exit {
                return Ok(Box::new(Cursor::new(output)));
            }
            let (tx, rx) = mpsc::channel();
            tx.send(output).unwrap();
            self.writer = Some(tx);
            Ok(Box::new(PipeReader {
                rx,
                pending: Cursor::new(Vec::new()),
            }))
        }

        fn wait(&mut self) -> Result<u32, PtyError> {
            if self.fail_wait {
                return Err(PtyError::Wait("no child processes".into()));
            }
            Ok(0)
        }

        fn try_wait(&mut self) -> Result<Option<u32>, PtyError> {
            Ok(Some(0))
        }

        fn close(&mut self) {
            self.writer = None;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for FakePty {
        fn drop(&mut self) {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn quick() -> SessionConfig {
        SessionConfig::default().without_delay()
    }

    fn output(lines: &[&str]) -> Vec<(String, bool)> {
        lines.iter().map(|l| (l.to_string(), true)).collect()
    }

    #[test]
    fn test_delivers_lines_in_order() {
        let backend = FakeBackend {
            output: b"a\r\nb\r\nc\r\n".to_vec(),
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "printf", &quick());

        assert_eq!(sink.lines(), output(&["a", "b", "c"]));
        assert_eq!(backend.counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lines_are_sanitized() {
        let backend = FakeBackend {
            output: b"\x1b[31mHello\x1b[0m\r\n\x1b]0;title\x07Visible\r\n".to_vec(),
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "colors", &quick());

        assert_eq!(sink.lines(), output(&["Hello", "Visible"]));
    }

    #[test]
    fn test_open_failure_reports_one_diagnostic() {
        let backend = FakeBackend {
            fail_open: true,
            output: b"never\n".to_vec(),
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "true", &quick());

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.starts_with("Error starting pty: "), "{lines:?}");
        assert!(!lines[0].1);
        assert_eq!(backend.counters.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_spawn_failure_releases_pty_once() {
        let backend = FakeBackend {
            fail_spawn: true,
            output: b"never\n".to_vec(),
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "true", &quick());

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.starts_with("Error spawning command: "), "{lines:?}");
        assert!(!lines[0].1);
        assert_eq!(backend.counters.releases.load(Ordering::SeqCst), 1);
        assert!(backend.counters.resized.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reader_failure_releases_pty_once() {
        let backend = FakeBackend {
            fail_reader: true,
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "true", &quick());

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.starts_with("Error starting pty: "));
        assert_eq!(backend.counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wait_failure_follows_output() {
        let backend = FakeBackend {
            fail_wait: true,
            output: b"done\n".to_vec(),
            ..FakeBackend::default()
        };
        let sink = Collect::default();
        run(&backend, &sink, "true", &quick());

        let lines = sink.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ("done".to_string(), true));
        assert_eq!(
            lines[1],
            ("Error waiting for process: no child processes".to_string(), false)
        );
        assert_eq!(backend.counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_environment_and_geometry_are_fixed() {
        let backend = FakeBackend::default();
        let sink = Collect::default();
        let config = SessionConfig {
            startup_delay_ms: 0,
            shell: Some("/bin/bash".into()),
        };
        run(&backend, &sink, "echo hi", &config);

        let spawned = backend.counters.spawned.lock().unwrap().clone().unwrap();
        assert_eq!(spawned.args, vec!["-c", "echo hi"]);
        assert_eq!(spawned.env_value("TERM"), Some("dumb"));
        assert_eq!(
            spawned.env_value("PATH").map(str::to_string),
            std::env::var("PATH").ok()
        );
        assert_eq!(
            *backend.counters.opened.lock().unwrap(),
            vec![PtyGeometry::new(1000, 48)]
        );
        assert_eq!(
            *backend.counters.resized.lock().unwrap(),
            vec![PtyGeometry::new(1000, 48)]
        );
        assert_eq!(backend.counters.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_output_held_open_ends_after_exit() {
        let backend = FakeBackend {
            close_after_exit: true,
            fail_wait: true,
            output: b"a\r\nb\r\nc\r\n".to_vec(),
            ..FakeBackend::default()
        };
        let counters = backend.counters.clone();
        let (done_tx, done_rx) = mpsc::channel();

        std::thread::spawn(move || {
            let sink = Collect::default();
            run(&backend, &sink, "Write-Output a b c", &quick());
            let _ = done_tx.send(sink.lines());
        });

        let lines = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("session did not end after the child exited");
        let mut expected = output(&["a", "b", "c"]);
        expected.push(("Error waiting for process: no child processes".into(), false));
        assert_eq!(lines, expected);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_session_is_fire_and_forget() {
        let backend = FakeBackend {
            output: b"x\ny\n".to_vec(),
            ..FakeBackend::default()
        };
        let releases = Arc::clone(&backend.counters.releases);
        let (tx, rx) = mpsc::channel();

        start_session_with(backend, Forward(Mutex::new(tx)), "anything", quick());

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(received, output(&["x", "y"]));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_startup_delay_is_observed() {
        let config = SessionConfig {
            startup_delay_ms: 50,
            ..SessionConfig::default()
        };
        let backend = FakeBackend::default();
        let sink = Collect::default();
        let start = std::time::Instant::now();
        run(&backend, &sink, "true", &config);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_session_three_lines() {
        let sink = Collect::default();
        run(
            &crate::UnixBackend::default(),
            &sink,
            "printf 'a\\nb\\nc\\n'",
            &quick(),
        );
        assert_eq!(sink.lines(), output(&["a", "b", "c"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_session_terminal_contract() {
        let sink = Collect::default();
        run(
            &crate::UnixBackend::default(),
            &sink,
            "echo $TERM; stty size",
            &quick(),
        );
        assert_eq!(sink.lines(), output(&["dumb", "48 1000"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_session_runs_bash_syntax() {
        if !crate::UnixBackend::default().shell().ends_with("bash") {
            return;
        }
        let sink = Collect::default();
        run(&crate::UnixBackend::default(), &sink, "echo {a,b}", &quick());
        assert_eq!(sink.lines(), output(&["a b"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_start_session_default_settings() {
        let (tx, rx) = mpsc::channel();
        let start = std::time::Instant::now();
        start_session(Forward(Mutex::new(tx)), "printf 'x\\n'");

        let mut received = Vec::new();
        while let Ok(line) = rx.recv_timeout(Duration::from_secs(10)) {
            received.push(line);
        }
        assert_eq!(received, output(&["x"]));
        assert!(start.elapsed() >= crate::STARTUP_GRACE_PERIOD);
    }

    #[cfg(windows)]
    #[test]
    fn test_real_console_session_three_lines() {
        let (tx, rx) = mpsc::channel();
        start_session_with(
            crate::ConsoleBackend::default(),
            Forward(Mutex::new(tx)),
            "'a', 'b', 'c' | Write-Output",
            quick(),
        );

        let mut received = Vec::new();
        while let Ok(line) = rx.recv_timeout(Duration::from_secs(30)) {
            received.push(line);
        }
        let text: Vec<_> = received
            .iter()
            .filter(|(text, _)| !text.trim().is_empty())
            .cloned()
            .collect();
        assert_eq!(text, output(&["a", "b", "c"]));
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_command_is_shell_output() {
        let sink = Collect::default();
        run(
            &crate::UnixBackend::default(),
            &sink,
            "simpal-definitely-not-a-command",
            &quick(),
        );
        let lines = sink.lines();
        assert!(!lines.is_empty());
        assert!(lines.iter().all(|(_, is_output)| *is_output), "{lines:?}");
        assert!(lines.iter().any(|(text, _)| text.contains("not found")), "{lines:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_shell_is_spawn_diagnostic() {
        let sink = Collect::default();
        run(
            &crate::UnixBackend::new("/nonexistent/simpal-sh"),
            &sink,
            "true",
            &quick(),
        );
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.starts_with("Error spawning command: "));
        assert!(!lines[0].1);
    }
}
