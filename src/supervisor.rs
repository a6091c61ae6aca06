//! The supervisor: startup ordering and the control loop.
//!
//! Startup runs exactly once, in this order: validation, identity
//! resolution, background detach, pid file, working directory, privilege
//! drop, signal handlers, stdio redirect. After that the process does no
//! work of its own; it waits for signals and lets the pool (or the solo
//! runner) react until a terminating signal arrives.

use tracing::debug;

use crate::config::SupervisorConfig;
use crate::daemon;
use crate::error::{Error, Result};
use crate::identity::{self, ProcessIdentity};
use crate::pidfile::PidFile;
use crate::pool::WorkerPool;
use crate::process::NixDriver;
use crate::reporter::{report_all, Severity};
use crate::signals::{SignalListener, SupervisorEvent, Termination};
use crate::solo;

/// Long-lived process that manages workers and responds to signals.
pub struct Supervisor {
    cfg: SupervisorConfig,
}

impl Supervisor {
    /// Validate the configuration and build a supervisor.
    ///
    /// Fails with a configuration error before any process is spawned when
    /// zero or two tasks are configured.
    pub fn new(cfg: SupervisorConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Run until a terminating signal; returns the status the process
    /// should exit with.
    ///
    /// In background mode the calling (parent) process exits 0 inside this
    /// function; only the detached child returns from it.
    pub fn run(self) -> Result<i32> {
        let cfg = self.cfg;

        // Resolve before any fork so a bad name is fatal early.
        let identity = ProcessIdentity::resolve(cfg.user.as_deref(), cfg.group.as_deref())?;
        identity.warn_if_superuser(&cfg.reporters);

        if cfg.background {
            daemon::detach()?;
        }

        let pid_file = write_pid_file(&cfg);

        if let Some(dir) = &cfg.working_dir {
            identity::prepare_working_dir(dir, &identity)?;
        }
        // Privileges drop only after session and pid-file setup.
        identity.apply()?;

        // Forking workers from a multi-threaded runtime would leave the
        // child's runtime unusable, so the loop runs on the current thread.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(event_loop(cfg, pid_file))
    }
}

fn write_pid_file(cfg: &SupervisorConfig) -> Option<PidFile> {
    let path = cfg.pid_file.as_deref()?;
    match PidFile::create(path) {
        Ok(pid_file) => Some(pid_file),
        Err(err) => {
            report_all(
                &cfg.reporters,
                Severity::Warning,
                &format!("could not write pid file {}: {err}", path.display()),
            );
            None
        }
    }
}

/// Remove the pid file on the controlled shutdown path and hand the exit
/// status back.
pub(crate) fn finish(pid_file: Option<PidFile>, code: i32) -> i32 {
    if let Some(pid_file) = pid_file {
        pid_file.remove();
    }
    code
}

async fn event_loop(cfg: SupervisorConfig, mut pid_file: Option<PidFile>) -> Result<i32> {
    let mut signals = SignalListener::new()?;
    if cfg.background {
        // Handlers are installed; nothing may write to the old terminal
        // from here on.
        daemon::redirect_stdio()?;
    }

    if !cfg.pool_mode() {
        return solo::run(&cfg, &mut signals, pid_file).await;
    }

    let Some(task) = cfg.worker_task.clone() else {
        return Err(Error::Config("no worker task configured".to_string()));
    };
    let mut pool = WorkerPool::new(NixDriver, task, &cfg);

    report_all(
        &cfg.reporters,
        Severity::Notice,
        &format!(
            "supervisor running, pid {}, target {} workers",
            std::process::id(),
            cfg.max_workers
        ),
    );
    pool.maintain().await;

    loop {
        match signals.wait().await {
            SupervisorEvent::ChildExited => pool.maintain().await,
            SupervisorEvent::Reconfigure => {
                cfg.reconfigure.on_reconfigure(&pool.live_workers());
                // Reconfiguration may have changed what workers should do;
                // top the pool back up immediately.
                pool.maintain().await;
            }
            SupervisorEvent::Terminate => {
                let code = pool.drain(Termination::Terminate).await;
                return Ok(finish(pid_file.take(), code));
            }
            SupervisorEvent::Interrupt => {
                debug!("interrupt received");
                let code = pool.drain(Termination::Interrupt).await;
                return Ok(finish(pid_file.take(), code));
            }
        }
    }
}
