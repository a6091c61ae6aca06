//! Fork and reap primitives for the worker pool.
//!
//! [`ProcessDriver`] is the seam between the pool's state machine and the
//! operating system: forking a worker, collecting exit statuses, and
//! signalling the process group all go through it, so the pool can be
//! exercised in tests with a scripted driver instead of real children.

use nix::sys::signal::{self, killpg, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpgrp, ForkResult, Pid};
use tracing::{debug, error, warn};

/// Which side of a fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forked {
    /// Parent branch, carrying the new worker's pid.
    Parent(u32),
    /// Child branch. The caller must run the worker task and exit; it must
    /// never return into the supervisor's control flow.
    Child,
}

/// Exit status of a reaped worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Process ID
    pub pid: u32,
    /// Exit code (if exited normally)
    pub code: Option<i32>,
    /// Signal number (if killed by signal)
    pub signal: Option<i32>,
}

impl WorkerExit {
    /// Check if the worker exited cleanly.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Nonzero exit code or signal-terminated.
    pub fn is_abnormal(&self) -> bool {
        !self.success()
    }

    /// Human-readable cause, for reports.
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exited with status {code}"),
            (None, Some(sig)) => format!("killed by signal {sig}"),
            (None, None) => "disappeared".to_string(),
        }
    }
}

/// Fork/wait provider used by the pool.
pub trait ProcessDriver {
    /// Fork a new worker. Returns the parent or child branch, or the OS
    /// error when the fork itself failed (resource exhaustion).
    fn fork_worker(&mut self) -> nix::Result<Forked>;

    /// Collect every immediately-available exit status without blocking.
    fn reap(&mut self) -> Vec<WorkerExit>;

    /// Send a signal to the supervisor's whole process group.
    fn signal_group(&mut self, sig: Signal);
}

/// The real driver.
pub struct NixDriver;

impl ProcessDriver for NixDriver {
    fn fork_worker(&mut self) -> nix::Result<Forked> {
        // SAFETY: the child branch performs no allocation or locking before
        // control returns to the caller, which resets signal dispositions
        // and runs the worker task without touching supervisor state.
        match unsafe { fork() }? {
            ForkResult::Parent { child } => Ok(Forked::Parent(child.as_raw() as u32)),
            ForkResult::Child => Ok(Forked::Child),
        }
    }

    fn reap(&mut self) -> Vec<WorkerExit> {
        let mut statuses = Vec::new();

        loop {
            match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(pid, code)) => {
                    let pid = pid.as_raw() as u32;
                    debug!(pid, code, "reaped worker");
                    statuses.push(WorkerExit {
                        pid,
                        code: Some(code),
                        signal: None,
                    });
                }
                Ok(WaitStatus::Signaled(pid, sig, _)) => {
                    let pid = pid.as_raw() as u32;
                    debug!(pid, signal = ?sig, "reaped signaled worker");
                    statuses.push(WorkerExit {
                        pid,
                        code: None,
                        signal: Some(sig as i32),
                    });
                }
                Ok(WaitStatus::StillAlive) | Err(nix::Error::ECHILD) => {
                    // Nothing more to collect.
                    break;
                }
                Ok(_) => continue,
                Err(err) => {
                    error!(error = %err, "error reaping workers");
                    break;
                }
            }
        }

        statuses
    }

    fn signal_group(&mut self, sig: Signal) {
        if let Err(err) = killpg(getpgrp(), sig) {
            warn!(error = %err, "failed to signal process group");
        }
    }
}

extern "C" fn exit_on_signal(_sig: libc::c_int) {
    // Only async-signal-safe calls are allowed here.
    unsafe { libc::_exit(0) };
}

/// Reset signal dispositions in a freshly forked worker.
///
/// Terminate, interrupt, and reconfigure all become a plain exit(0); the
/// worker must not run any part of the supervisor's shutdown sequence.
/// Child-exit is ignored so a worker never reaps its own accidental
/// descendants.
pub(crate) fn reset_worker_signals() {
    let handler = SigHandler::Handler(exit_on_signal);
    // SAFETY: exit_on_signal only calls _exit, which is async-signal-safe.
    unsafe {
        for sig in [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP] {
            if let Err(err) = signal::signal(sig, handler) {
                warn!(signal = ?sig, error = %err, "failed to reset worker signal");
            }
        }
        if let Err(err) = signal::signal(Signal::SIGCHLD, SigHandler::SigIgn) {
            warn!(error = %err, "failed to ignore SIGCHLD in worker");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_exit_is_not_abnormal() {
        let exit = WorkerExit {
            pid: 42,
            code: Some(0),
            signal: None,
        };
        assert!(exit.success());
        assert!(!exit.is_abnormal());
    }

    #[test]
    fn nonzero_status_is_abnormal() {
        let exit = WorkerExit {
            pid: 42,
            code: Some(3),
            signal: None,
        };
        assert!(exit.is_abnormal());
        assert_eq!(exit.describe(), "exited with status 3");
    }

    #[test]
    fn signal_death_is_abnormal() {
        let exit = WorkerExit {
            pid: 42,
            code: None,
            signal: Some(9),
        };
        assert!(exit.is_abnormal());
        assert_eq!(exit.describe(), "killed by signal 9");
    }
}
