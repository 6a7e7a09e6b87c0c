//! Cooperative interruption
//!
//! The first SIGINT/SIGTERM/SIGHUP only raises a shutdown flag: the runner
//! finishes the in-flight invocation, stops, and still saves its results. A
//! second SIGINT or SIGTERM kills the in-flight child's process group and
//! ends the process immediately.

use anyhow::Result;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Shutdown state shared between the signal thread and the runner
#[derive(Clone, Debug, Default)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    signal_number: Arc<AtomicI32>,
    /// Process group of the running child, 0 when idle
    child_group: Arc<AtomicI32>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install handlers for SIGINT, SIGTERM and SIGHUP
    pub fn setup(&self) -> Result<()> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
        let handler = self.clone();

        thread::spawn(move || {
            for sig in signals.forever() {
                let repeated = handler.signal_number.swap(sig, Ordering::SeqCst) != 0;
                handler.shutdown_flag.store(true, Ordering::SeqCst);
                if repeated && matches!(sig, SIGINT | SIGTERM) {
                    warn!(signal = sig, "interrupted again; exiting now");
                    handler.kill_child_group();
                    process::exit(128 + sig);
                }
                warn!(signal = sig, "interrupted; stopping after the current invocation");
            }
        });

        Ok(())
    }

    /// Check if shutdown was requested
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Raise the shutdown flag without a signal
    pub fn request_shutdown(&self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Signal that triggered shutdown (0 if none)
    pub fn signal_number(&self) -> i32 {
        self.signal_number.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.signal_number.store(0, Ordering::SeqCst);
        self.shutdown_flag.store(false, Ordering::SeqCst);
    }

    /// Remember the process group of the child being measured
    pub fn track_child_group(&self, pgid: i32) {
        self.child_group.store(pgid, Ordering::SeqCst);
    }

    pub fn clear_child_group(&self) {
        self.child_group.store(0, Ordering::SeqCst);
    }

    pub fn child_group(&self) -> Option<i32> {
        Some(self.child_group.load(Ordering::SeqCst)).filter(|pgid| *pgid > 0)
    }

    /// SIGKILL the tracked child group, if any; true when a group was signalled
    pub fn kill_child_group(&self) -> bool {
        match self.child_group() {
            Some(pgid) => killpg(Pid::from_raw(pgid), Signal::SIGKILL).is_ok(),
            None => false,
        }
    }

    /// Conventional exit status for the received signal
    pub fn exit_code(&self) -> i32 {
        match self.signal_number() {
            SIGINT => 130,
            SIGTERM => 143,
            SIGHUP => 129,
            _ => 1,
        }
    }
}
