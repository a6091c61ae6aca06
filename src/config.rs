//! Supervisor configuration.
//!
//! [`SupervisorConfig`] records everything decided before startup: target
//! identity, working directory, pid file, background mode, pool sizing and
//! delays, and the hook implementations. It is immutable once the
//! supervisor starts; configuration records intent, application happens at
//! daemon start.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::hooks::{
    ChildExitHook, DefaultKillAll, KillHook, LogChildExit, NoopReconfigure, ReconfigureHook,
    TaskRef,
};
use crate::reporter::{ReporterRef, TracingReporter};

/// Configuration for a [`Supervisor`](crate::Supervisor).
///
/// Exactly one of [`worker_task`](Self::worker_task) and
/// [`solo_task`](Self::solo_task) must be set; [`validate`](Self::validate)
/// rejects everything else before any process is spawned.
#[derive(Clone)]
pub struct SupervisorConfig {
    /// Target user, as a numeric id or an account name. Applied at daemon
    /// start, after session setup.
    pub user: Option<String>,
    /// Target group, numeric id or group name. Switched before the user.
    pub group: Option<String>,
    /// Working directory; created with mode 0o700 if absent.
    pub working_dir: Option<PathBuf>,
    /// Pid file path. Written at startup, removed on controlled shutdown.
    pub pid_file: Option<PathBuf>,
    /// Detach from the terminal and run as a daemon.
    pub background: bool,
    /// Target number of live workers.
    pub max_workers: usize,
    /// Pause after an abnormal worker exit, throttling respawn storms.
    pub recovery_delay: Duration,
    /// Pause between fork attempts while the OS refuses to fork.
    pub fork_retry_delay: Duration,
    /// Time granted to workers between the polite terminate and the
    /// group-wide sweep during draining.
    pub grace: Duration,
    /// Task forked into each worker. Mutually exclusive with `solo_task`.
    pub worker_task: Option<TaskRef>,
    /// Task run inline in the supervisor process instead of a pool.
    pub solo_task: Option<TaskRef>,
    /// Reconfigure-signal hook.
    pub reconfigure: Arc<dyn ReconfigureHook>,
    /// Draining hook; the default sends SIGTERM to each worker.
    pub kill_all: Arc<dyn KillHook>,
    /// Per-reaped-worker hook.
    pub on_child_exit: Arc<dyn ChildExitHook>,
    /// Report sinks. At least one is required before backgrounding.
    pub reporters: Vec<ReporterRef>,
}

impl Default for SupervisorConfig {
    /// Provides a default configuration:
    /// - `max_workers = 10`
    /// - `recovery_delay = 5s`, `fork_retry_delay = 1s`, `grace = 2s`
    /// - no identity change, no working directory, no pid file, foreground
    /// - stock hooks and a single [`TracingReporter`] sink
    fn default() -> Self {
        Self {
            user: None,
            group: None,
            working_dir: None,
            pid_file: None,
            background: false,
            max_workers: 10,
            recovery_delay: Duration::from_secs(5),
            fork_retry_delay: Duration::from_secs(1),
            grace: Duration::from_secs(2),
            worker_task: None,
            solo_task: None,
            reconfigure: Arc::new(NoopReconfigure),
            kill_all: Arc::new(DefaultKillAll),
            on_child_exit: Arc::new(LogChildExit),
            reporters: vec![Arc::new(TracingReporter)],
        }
    }
}

impl SupervisorConfig {
    /// Check the invariants that must hold before anything is spawned.
    pub fn validate(&self) -> Result<()> {
        match (&self.worker_task, &self.solo_task) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "worker task and solo task are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(Error::Config(
                    "either a worker task or a solo task must be configured".to_string(),
                ))
            }
            _ => {}
        }

        if self.background && self.reporters.is_empty() {
            return Err(Error::Config(
                "cannot detach without a configured report sink".to_string(),
            ));
        }

        Ok(())
    }

    /// True when the supervisor should run the worker pool rather than the
    /// solo runner.
    pub fn pool_mode(&self) -> bool {
        self.worker_task.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::TaskFn;

    #[test]
    fn one_task_passes_validation() {
        let mut cfg = SupervisorConfig::default();
        cfg.worker_task = Some(TaskFn::arc(|| Ok(0)));
        assert!(cfg.validate().is_ok());
        assert!(cfg.pool_mode());

        let mut cfg = SupervisorConfig::default();
        cfg.solo_task = Some(TaskFn::arc(|| Ok(0)));
        assert!(cfg.validate().is_ok());
        assert!(!cfg.pool_mode());
    }

    #[test]
    fn both_tasks_rejected() {
        let mut cfg = SupervisorConfig::default();
        cfg.worker_task = Some(TaskFn::arc(|| Ok(0)));
        cfg.solo_task = Some(TaskFn::arc(|| Ok(0)));
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn no_task_rejected() {
        let cfg = SupervisorConfig::default();
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn backgrounding_requires_a_sink() {
        let mut cfg = SupervisorConfig::default();
        cfg.worker_task = Some(TaskFn::arc(|| Ok(0)));
        cfg.background = true;
        cfg.reporters.clear();
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        cfg.reporters = vec![Arc::new(TracingReporter)];
        assert!(cfg.validate().is_ok());
    }
}
