//! Prefork worker-pool supervisor and daemonizer.
//!
//! This crate turns an ordinary process into a background daemon and,
//! optionally, manages a pool of forked worker subprocesses that perform
//! the actual work. It handles:
//!
//! - Terminal detachment (fork, new session, stdio redirect, pid file)
//! - Privilege dropping (user/group resolution and switch, working dir)
//! - Worker pool maintenance (spawn up to a target count, non-blocking
//!   reaping, recovery delay after abnormal exits, fork-retry backoff)
//! - Signal-driven control (SIGCHLD, SIGHUP, SIGTERM, SIGINT)
//! - A solo mode that runs one task inline instead of a pool
//!
//! # Architecture
//!
//! The supervisor is composed of several components:
//!
//! - **Supervisor**: startup ordering and the control loop
//! - **WorkerPool**: the live-worker registry and respawn/backoff policy
//! - **SignalListener**: adapter from OS signals to control-loop events
//! - **Hook traits**: the task, reconfigure, kill-all, and child-exit
//!   contracts, plus the [`Reporter`] sink
//!
//! The unit of work, option parsing, and the log sink are collaborators
//! supplied through those contracts; the supervisor only ever observes a
//! worker's exit status.
//!
//! # Example
//!
//! ```no_run
//! use preforkd::{Supervisor, SupervisorConfig, TaskFn};
//!
//! fn main() -> preforkd::Result<()> {
//!     let mut cfg = SupervisorConfig::default();
//!     cfg.max_workers = 4;
//!     cfg.worker_task = Some(TaskFn::arc(|| {
//!         // one unit of work per worker process
//!         Ok(0)
//!     }));
//!
//!     let code = Supervisor::new(cfg)?.run()?;
//!     std::process::exit(code);
//! }
//! ```

pub mod config;
mod daemon;
pub mod error;
pub mod hooks;
pub mod identity;
pub mod pidfile;
pub mod pool;
pub mod process;
pub mod reporter;
pub mod signals;
mod solo;
pub mod supervisor;

// Re-export main types
pub use config::SupervisorConfig;
pub use error::{Error, Result, TaskError};
pub use hooks::{
    ChildExitHook, DefaultKillAll, KillHook, LogChildExit, NoopReconfigure, ReconfigureHook, Task,
    TaskFn, TaskRef,
};
pub use identity::ProcessIdentity;
pub use pidfile::PidFile;
pub use pool::{PoolState, WorkerPool};
pub use process::{Forked, NixDriver, ProcessDriver, WorkerExit};
pub use reporter::{Reporter, ReporterRef, Severity, TracingReporter};
pub use signals::{SignalListener, SupervisorEvent, Termination};
pub use supervisor::Supervisor;
