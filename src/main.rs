//! Reference daemon binary.
//!
//! Wires command-line flags and an optional TOML option file into a
//! [`SupervisorConfig`] and supervises a pool of workers that each run the
//! configured command, or runs it once inline with `--solo`.

mod settings;

use std::path::PathBuf;
use std::process::Command;

use anyhow::bail;
use clap::Parser;
use preforkd::{Supervisor, SupervisorConfig, Task, TaskError, TaskRef};
use tracing_subscriber::EnvFilter;

use settings::Settings;

#[derive(Parser)]
#[command(
    name = "preforkd",
    about = "Prefork worker-pool supervisor and daemonizer",
    version
)]
struct Cli {
    /// Option file (TOML); command-line flags win over it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run as this user (numeric id or account name)
    #[arg(short, long)]
    user: Option<String>,

    /// Run as this group (numeric id or group name)
    #[arg(short, long)]
    group: Option<String>,

    /// Working directory (created owner-only if absent)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Pid file path
    #[arg(short, long)]
    pid_file: Option<PathBuf>,

    /// Detach from the terminal and run in the background
    #[arg(short, long)]
    daemon: bool,

    /// Target number of workers
    #[arg(short = 'n', long)]
    workers: Option<usize>,

    /// Run the command once, inline, instead of a worker pool
    #[arg(long)]
    solo: bool,

    /// Command each worker runs
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

/// Task that runs the configured command and reports its exit status.
struct CommandTask {
    argv: Vec<String>,
}

impl Task for CommandTask {
    fn run(&self) -> Result<i32, TaskError> {
        let status = Command::new(&self.argv[0]).args(&self.argv[1..]).status()?;
        // A signal death maps to failure; the supervisor only sees codes.
        Ok(status.code().unwrap_or(1))
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "startup failed");
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };

    let command = if cli.command.is_empty() {
        settings.command.unwrap_or_default()
    } else {
        cli.command
    };
    if command.is_empty() {
        bail!("no command given; pass one after the options or in the option file");
    }

    let task: TaskRef = std::sync::Arc::new(CommandTask { argv: command });

    let mut cfg = SupervisorConfig::default();
    cfg.user = cli.user.or(settings.user);
    cfg.group = cli.group.or(settings.group);
    cfg.working_dir = cli.workdir.or(settings.working_dir);
    cfg.pid_file = cli.pid_file.or(settings.pid_file);
    cfg.background = cli.daemon || settings.daemon.unwrap_or(false);
    if let Some(workers) = cli.workers.or(settings.workers) {
        cfg.max_workers = workers;
    }
    if cli.solo || settings.solo.unwrap_or(false) {
        cfg.solo_task = Some(task);
    } else {
        cfg.worker_task = Some(task);
    }

    Ok(Supervisor::new(cfg)?.run()?)
}
