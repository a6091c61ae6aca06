//! Typed hook contracts consumed by the supervisor.
//!
//! Each hook is a small capability trait with a stock implementation,
//! selected at configuration time:
//!
//! - [`Task`]: the unit of work run by a worker (forked) or by the solo
//!   runner (inline). Returns a process exit code.
//! - [`ReconfigureHook`]: invoked on the reconfigure signal with the
//!   ordered pids of the live workers.
//! - [`KillHook`]: invoked at the start of draining; the default sends a
//!   polite terminate to each worker.
//! - [`ChildExitHook`]: invoked for every reaped worker.

use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::TaskError;
use crate::process::WorkerExit;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// Unit of work executed by a worker process or the solo runner.
///
/// The contract is the same in both modes: no input, an exit code out
/// (0 = success), and any [`TaskError`] is reported and converted to exit
/// status 1 by the process that ran the task. Worker tasks execute inside a
/// freshly forked child, so the trait is synchronous.
pub trait Task: Send + Sync {
    /// Run one unit of work and return the process exit code.
    fn run(&self) -> Result<i32, TaskError>;
}

/// Closure-backed task implementation.
pub struct TaskFn<F>(F);

impl<F> TaskFn<F>
where
    F: Fn() -> Result<i32, TaskError> + Send + Sync + 'static,
{
    /// Creates a new function-backed task.
    pub fn new(f: F) -> Self {
        Self(f)
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F> Task for TaskFn<F>
where
    F: Fn() -> Result<i32, TaskError> + Send + Sync + 'static,
{
    fn run(&self) -> Result<i32, TaskError> {
        (self.0)()
    }
}

/// Hook invoked when the reconfigure signal arrives.
pub trait ReconfigureHook: Send + Sync {
    /// Receives the ordered pids of the currently live workers (empty in
    /// solo mode).
    fn on_reconfigure(&self, workers: &[u32]);
}

/// Stock reconfigure hook: records the request and does nothing else.
pub struct NoopReconfigure;

impl ReconfigureHook for NoopReconfigure {
    fn on_reconfigure(&self, workers: &[u32]) {
        debug!(workers = workers.len(), "reconfigure requested, no hook configured");
    }
}

/// Hook invoked with the live worker pids when draining starts.
pub trait KillHook: Send + Sync {
    fn kill_all(&self, workers: &[u32]);
}

/// Stock kill hook: a polite terminate to each worker.
pub struct DefaultKillAll;

impl KillHook for DefaultKillAll {
    fn kill_all(&self, workers: &[u32]) {
        for &pid in workers {
            if let Err(err) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                warn!(pid, error = %err, "failed to signal worker");
            }
        }
    }
}

/// Hook invoked for every reaped worker.
pub trait ChildExitHook: Send + Sync {
    fn on_exit(&self, exit: &WorkerExit);
}

/// Stock child-exit hook: one log line per departed worker.
pub struct LogChildExit;

impl ChildExitHook for LogChildExit {
    fn on_exit(&self, exit: &WorkerExit) {
        info!(pid = exit.pid, "worker {}", exit.describe());
    }
}
