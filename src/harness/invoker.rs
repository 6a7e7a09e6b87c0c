//! Timeout-bounded execution of the compiler under test
//!
//! Each invocation runs in its own process group with stdout and stderr
//! joined into one pipe. When the deadline passes the whole group is killed
//! and reaped, so no compiler process outlives its measurement.

use crate::error::{HarnessError, Result};
use crate::signal::SignalHandler;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitid, Id, WaitPidFlag};
use nix::unistd::Pid;
use std::io::{ErrorKind, Read};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long output is still read once the process group is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The process exited on its own; `output` is stdout and stderr combined
    Completed {
        output: String,
        elapsed: Duration,
        success: bool,
    },
    /// The deadline passed and the process group was killed
    TimedOut { elapsed: Duration },
}

impl Outcome {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut { .. })
    }
}

/// Runs the external binary
///
/// The runner only talks to this trait, which keeps the orchestration
/// testable without a real compiler.
pub trait Invoker {
    /// Run `program` with `fixed_args` followed by `mode_flags`
    ///
    /// `timeout = None` (or zero) waits indefinitely. Blocks until the
    /// process exits or is killed. Never retries.
    fn invoke(
        &mut self,
        program: &Path,
        fixed_args: &[String],
        mode_flags: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Outcome>;
}

/// `Invoker` backed by real child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessInvoker {
    signals: Option<SignalHandler>,
}

impl ProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish each child's process group to `signals`, so a forced exit
    /// can take the child down with it
    pub fn with_signals(signals: SignalHandler) -> Self {
        Self {
            signals: Some(signals),
        }
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(
        &mut self,
        program: &Path,
        fixed_args: &[String],
        mode_flags: &[&str],
        timeout: Option<Duration>,
    ) -> Result<Outcome> {
        let timeout = timeout.filter(|t| !t.is_zero());
        let spawn_err = |source| HarnessError::Spawn {
            program: program.to_path_buf(),
            source,
        };

        let (reader, writer) = os_pipe::pipe().map_err(spawn_err)?;
        let writer_clone = writer.try_clone().map_err(spawn_err)?;

        let mut cmd = Command::new(program);
        cmd.args(fixed_args)
            .args(mode_flags)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_clone)
            .process_group(0);

        debug!(program = %program.display(), ?fixed_args, ?mode_flags, "spawning");

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(spawn_err)?;
        // The Command still owns the parent's copies of the write end; they
        // must be closed or the reader never sees EOF.
        drop(cmd);

        let pid = Pid::from_raw(child.id() as i32);
        if let Some(signals) = &self.signals {
            signals.track_child_group(pid.as_raw());
        }
        let chunks = collect_output(reader);

        let (exit_tx, exit_rx) = mpsc::channel::<()>();
        thread::spawn(move || {
            wait_exited(pid);
            let _ = exit_tx.send(());
        });

        let timed_out = match timeout {
            Some(limit) => matches!(exit_rx.recv_timeout(limit), Err(RecvTimeoutError::Timeout)),
            None => {
                let _ = exit_rx.recv();
                false
            }
        };
        let mut elapsed = start.elapsed();

        // The leader is not reaped yet, so its pid still names the group.
        // This also takes down anything it left behind holding the pipe.
        let _ = killpg(pid, Signal::SIGKILL);
        if timed_out {
            let _ = exit_rx.recv();
            elapsed = start.elapsed();
        }
        let status = child.wait();
        if let Some(signals) = &self.signals {
            signals.clear_child_group();
        }
        let status = status.map_err(|source| HarnessError::Wait {
            program: program.to_path_buf(),
            source,
        })?;

        if timed_out {
            debug!(program = %program.display(), ?elapsed, "killed after timeout");
            return Ok(Outcome::TimedOut { elapsed });
        }

        let bytes = drain(&chunks, DRAIN_GRACE);
        Ok(Outcome::Completed {
            output: String::from_utf8_lossy(&bytes).into_owned(),
            elapsed,
            success: status.success(),
        })
    }
}

/// Read the pipe on a background thread, forwarding chunks as they arrive
fn collect_output(mut reader: os_pipe::PipeReader) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

/// Everything read until EOF, or until `grace` runs out
///
/// A descendant that left the process group can keep the pipe open
/// indefinitely; its output after the deadline is dropped.
fn drain(chunks: &Receiver<Vec<u8>>, grace: Duration) -> Vec<u8> {
    let deadline = Instant::now() + grace;
    let mut bytes = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                warn!("output pipe still open after exit; keeping what was read");
                break;
            }
        }
    }
    bytes
}

/// Block until `pid` exits without reaping it
fn wait_exited(pid: Pid) {
    loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            Err(e) => {
                debug!(%pid, error = %e, "waitid failed");
                return;
            }
            Ok(_) => return,
        }
    }
}
