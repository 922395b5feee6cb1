//! External tool execution with merged output and cooperative cancellation.
//!
//! Every command runs through `sh -c` in its own process group, with stderr
//! folded into stdout. Output is forwarded line by line to a log writer until
//! the shell exits; a background descendant that keeps the pipe open does not
//! hold up the run. The running process tree is owned by a [`ChildGuard`];
//! dropping the guard before the process has been reaped terminates the whole
//! group, so no exit path leaves tool processes behind.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::FlowError;

/// How often the runner checks for cancellation while waiting for output.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time a terminated process group gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// A shared flag raised when the user asks the run to stop.
///
/// Cloning shares the flag. The signal handler holds one clone and calls
/// [`CancelToken::cancel`]; runners poll [`CancelToken::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation of every runner sharing this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessOutcome {
    /// Exit code; `128 + signal` when the shell was killed by a signal.
    pub exit_code: i32,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl ProcessOutcome {
    /// Returns `true` for a zero exit code.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs shell commands, honouring a shared [`CancelToken`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    cancel: CancelToken,
    grace: Duration,
}

impl ProcessRunner {
    /// Creates a runner that stops when `cancel` is raised.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            grace: TERMINATE_GRACE,
        }
    }

    /// Sets how long a terminated process group may take to exit.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// The token this runner polls.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Runs `command` in `cwd`, writing its merged output to `log`.
    ///
    /// `envs` are added to the inherited environment. Returns
    /// [`FlowError::Interrupted`] if the token is raised before the command
    /// exits; the process group has been terminated by then.
    pub fn run(
        &self,
        command: &str,
        cwd: &Path,
        envs: &[(&str, &OsStr)],
        log: &mut dyn Write,
    ) -> Result<ProcessOutcome, FlowError> {
        if self.cancel.is_cancelled() {
            return Err(FlowError::Interrupted {
                command: command.to_string(),
            });
        }

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("exec 2>&1\n{command}"))
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        for (key, value) in envs {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        debug!(command, cwd = %cwd.display(), "spawning");
        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| FlowError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let mut guard = ChildGuard::new(child, self.grace);

        let (tx, rx) = mpsc::channel::<Vec<u8>>();
        if let Some(stdout) = guard.child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).split(b'\n') {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        let io_err = |e: std::io::Error| FlowError::Spawn {
            command: command.to_string(),
            source: e,
        };
        let mut exited = None;
        loop {
            if self.cancel.is_cancelled() {
                warn!(command, "interrupted, terminating process group");
                return Err(FlowError::Interrupted {
                    command: command.to_string(),
                });
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => write_line(log, line).map_err(io_err)?,
                Err(RecvTimeoutError::Timeout) => {
                    // A background descendant may still hold the pipe open.
                    if let Some(status) = guard.try_wait().map_err(io_err)? {
                        exited = Some((status, started.elapsed()));
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let (status, elapsed) = match exited {
            Some(done) => {
                debug!(command, "exited with output still open, draining");
                drain(&rx, log, Instant::now() + POLL_INTERVAL).map_err(io_err)?;
                done
            }
            None => {
                let status = guard.wait().map_err(io_err)?;
                (status, started.elapsed())
            }
        };
        log.flush().map_err(io_err)?;
        let outcome = ProcessOutcome {
            exit_code: exit_code(status),
            elapsed,
        };
        debug!(command, exit_code = outcome.exit_code, "finished");
        Ok(outcome)
    }
}

fn write_line(log: &mut dyn Write, mut line: Vec<u8>) -> std::io::Result<()> {
    line.push(b'\n');
    log.write_all(&line)
}

/// Forwards lines already produced before `until`, then stops even if the
/// pipe is still open.
fn drain(rx: &Receiver<Vec<u8>>, log: &mut dyn Write, until: Instant) -> std::io::Result<()> {
    while let Some(left) = until.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(line) => write_line(log, line)?,
            Err(_) => break,
        }
    }
    Ok(())
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Owns a spawned process group until it has been reaped.
struct ChildGuard {
    child: Child,
    grace: Duration,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child, grace: Duration) -> Self {
        Self {
            child,
            grace,
            reaped: false,
        }
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        self.reaped = status.is_some();
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        let pid = self.child.id();
        signal_group(pid, "TERM");
        let deadline = Instant::now() + self.grace;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) if Instant::now() >= deadline => break,
                Ok(None) => thread::sleep(Duration::from_millis(20)),
            }
        }
        signal_group(pid, "KILL");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => {}
        // The group is already gone once every member has exited.
        Ok(status) => debug!(pgid, signal, %status, "kill reported no process group"),
        Err(e) => debug!(pgid, signal, error = %e, "could not run kill"),
    }
}

#[cfg(not(unix))]
fn signal_group(_pgid: u32, _signal: &str) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> ProcessRunner {
        ProcessRunner::new(CancelToken::new()).with_grace(Duration::from_millis(200))
    }

    #[test]
    fn merges_stdout_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = Vec::new();
        let outcome = runner()
            .run("echo out; echo err >&2", dir.path(), &[], &mut log)
            .unwrap();
        assert!(outcome.success());
        let text = String::from_utf8(log).unwrap();
        assert!(text.contains("out\n"));
        assert!(text.contains("err\n"));
    }

    #[test]
    fn reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = Vec::new();
        let outcome = runner().run("exit 3", dir.path(), &[], &mut log).unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(!outcome.success());
    }

    #[test]
    fn runs_in_cwd_with_extra_env() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = Vec::new();
        runner()
            .run(
                "pwd; echo \"$EDAFLOW_EXTRA\"",
                dir.path(),
                &[("EDAFLOW_EXTRA", OsStr::new("extra-value"))],
                &mut log,
            )
            .unwrap();
        let text = String::from_utf8(log).unwrap();
        let cwd = dir.path().canonicalize().unwrap();
        assert!(text.contains(&cwd.display().to_string()));
        assert!(text.contains("extra-value"));
    }

    #[test]
    fn returns_when_the_shell_exits_despite_background_output_holder() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let mut log = Vec::new();
        let outcome = runner()
            .run("sleep 5 & echo launched; exit 0", dir.path(), &[], &mut log)
            .unwrap();
        assert!(outcome.success());
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(outcome.elapsed < Duration::from_secs(2));
        assert!(String::from_utf8(log).unwrap().contains("launched\n"));
    }

    #[test]
    fn pre_cancelled_token_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let marker = dir.path().join("ran");
        let mut log = Vec::new();
        let err = ProcessRunner::new(token)
            .run(&format!("touch {}", marker.display()), dir.path(), &[], &mut log)
            .unwrap_err();
        assert!(matches!(err, FlowError::Interrupted { .. }));
        assert!(!marker.exists());
    }

    #[test]
    fn cancellation_terminates_the_process_group() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancelToken::new();
        let runner = ProcessRunner::new(token.clone()).with_grace(Duration::from_millis(200));

        let canceller = {
            let token = token.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                token.cancel();
            })
        };

        let started = Instant::now();
        let mut log = Vec::new();
        let err = runner
            .run("sleep 30 & sleep 30; wait", dir.path(), &[], &mut log)
            .unwrap_err();
        canceller.join().unwrap();
        assert!(matches!(err, FlowError::Interrupted { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
