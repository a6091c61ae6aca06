//! Worker pool: registry, respawn policy, and draining.
//!
//! The pool owns the set of live worker pids and is the only thing that
//! mutates it. All entry points run on the supervisor's single control
//! loop, so reaping and spawning can never interleave with shutdown.
//!
//! The fork/wait provider is injected through
//! [`ProcessDriver`](crate::process::ProcessDriver), which keeps the state
//! machine testable without real children.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::sys::signal::Signal;
use tokio::time::sleep;
use tracing::debug;

use crate::config::SupervisorConfig;
use crate::hooks::{ChildExitHook, KillHook, Task, TaskRef};
use crate::process::{Forked, ProcessDriver};
use crate::reporter::{report_all, ReporterRef, Severity};
use crate::signals::Termination;

/// Lifecycle of the pool as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Spawning and maintaining workers up to the target count.
    Running,
    /// Target forced to zero; waiting out the grace period.
    Draining,
    /// Terminal.
    Stopped,
}

/// Repeat suppression for fork-failure alerts.
///
/// The first failure of a burst is alerted; later failures stay silent
/// until the counter reaches the remind threshold, at which point it resets
/// so the next failure alerts again. A successful fork clears the burst.
#[derive(Debug, Default)]
struct ForkBackoff {
    consecutive: u32,
}

impl ForkBackoff {
    const REMIND_AFTER: u32 = 300;

    fn should_alert(&mut self) -> bool {
        let alert = self.consecutive == 0;
        self.consecutive += 1;
        if self.consecutive >= Self::REMIND_AFTER {
            self.consecutive = 0;
        }
        alert
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// Pool of forked worker processes.
pub struct WorkerPool<D: ProcessDriver> {
    driver: D,
    task: TaskRef,
    max_workers: usize,
    recovery_delay: Duration,
    fork_retry_delay: Duration,
    grace: Duration,
    kill_all: Arc<dyn KillHook>,
    on_child_exit: Arc<dyn ChildExitHook>,
    reporters: Vec<ReporterRef>,
    live: BTreeMap<u32, Instant>,
    state: PoolState,
    backoff: ForkBackoff,
}

impl<D: ProcessDriver> WorkerPool<D> {
    pub fn new(driver: D, task: TaskRef, cfg: &SupervisorConfig) -> Self {
        Self {
            driver,
            task,
            max_workers: cfg.max_workers,
            recovery_delay: cfg.recovery_delay,
            fork_retry_delay: cfg.fork_retry_delay,
            grace: cfg.grace,
            kill_all: cfg.kill_all.clone(),
            on_child_exit: cfg.on_child_exit.clone(),
            reporters: cfg.reporters.clone(),
            live: BTreeMap::new(),
            state: PoolState::Running,
            backoff: ForkBackoff::default(),
        }
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// Ordered pids of the live workers.
    pub fn live_workers(&self) -> Vec<u32> {
        self.live.keys().copied().collect()
    }

    /// Reap everything collectible, then top the pool back up.
    ///
    /// Invoked on every child-exit signal and once at startup. Idempotent
    /// when nothing has exited and the pool is full.
    pub async fn maintain(&mut self) {
        if self.state != PoolState::Running {
            return;
        }
        self.reap_exited().await;
        self.spawn_to_target().await;
    }

    /// Ask every worker to exit, sweep the process group after the grace
    /// period, and return the signal-derived exit status.
    ///
    /// The group-wide terminate does not touch the supervisor itself: its
    /// own handlers remain installed and draining ignores further events.
    pub async fn drain(&mut self, cause: Termination) -> i32 {
        if self.state == PoolState::Running {
            self.state = PoolState::Draining;
            let workers = self.live_workers();
            report_all(
                &self.reporters,
                Severity::Notice,
                &format!("draining on {cause}: asking {} workers to exit", workers.len()),
            );
            self.kill_all.kill_all(&workers);
            sleep(self.grace).await;
            self.driver.signal_group(Signal::SIGTERM);
            self.live.clear();
            self.state = PoolState::Stopped;
        }
        cause.exit_code()
    }

    async fn reap_exited(&mut self) {
        for exit in self.driver.reap() {
            self.live.remove(&exit.pid);
            self.on_child_exit.on_exit(&exit);
            if exit.is_abnormal() {
                report_all(
                    &self.reporters,
                    Severity::Warning,
                    &format!("worker {} {}", exit.pid, exit.describe()),
                );
                // Throttle respawn storms when a shared dependency is down.
                sleep(self.recovery_delay).await;
            }
        }
    }

    async fn spawn_to_target(&mut self) {
        while self.state == PoolState::Running && self.live.len() < self.max_workers {
            match self.driver.fork_worker() {
                Err(err) => {
                    if self.backoff.should_alert() {
                        report_all(
                            &self.reporters,
                            Severity::Alert,
                            &format!("failed to fork a worker: {err}"),
                        );
                    }
                    sleep(self.fork_retry_delay).await;
                }
                Ok(Forked::Parent(pid)) => {
                    self.backoff.reset();
                    self.live.insert(pid, Instant::now());
                    debug!(pid, live = self.live.len(), "worker spawned");
                }
                Ok(Forked::Child) => {
                    // The child must not believe it has siblings.
                    self.live.clear();
                    worker_main(&*self.task, &self.reporters);
                }
            }
        }
    }
}

/// Body of a freshly forked worker. Never returns into pool code.
fn worker_main(task: &dyn Task, reporters: &[ReporterRef]) -> ! {
    crate::process::reset_worker_signals();
    let code = match task.run() {
        Ok(code) => code,
        Err(err) => {
            report_all(reporters, Severity::Alert, &format!("worker task failed: {err}"));
            1
        }
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::TaskFn;
    use crate::process::WorkerExit;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant as TokioInstant;

    #[derive(Default)]
    struct Script {
        fork_failures: u32,
        next_pid: u32,
        pending: VecDeque<WorkerExit>,
        forked: Vec<(u32, TokioInstant)>,
        group_signals: Vec<Signal>,
    }

    #[derive(Clone, Default)]
    struct FakeDriver(Arc<Mutex<Script>>);

    impl FakeDriver {
        fn push_exit(&self, exit: WorkerExit) {
            self.0.lock().unwrap().pending.push_back(exit);
        }

        fn fail_next_forks(&self, count: u32) {
            self.0.lock().unwrap().fork_failures = count;
        }

        fn forked(&self) -> Vec<(u32, TokioInstant)> {
            self.0.lock().unwrap().forked.clone()
        }

        fn group_signals(&self) -> Vec<Signal> {
            self.0.lock().unwrap().group_signals.clone()
        }
    }

    impl ProcessDriver for FakeDriver {
        fn fork_worker(&mut self) -> nix::Result<Forked> {
            let mut script = self.0.lock().unwrap();
            if script.fork_failures > 0 {
                script.fork_failures -= 1;
                return Err(nix::Error::EAGAIN);
            }
            script.next_pid += 1;
            let pid = 40_000 + script.next_pid;
            script.forked.push((pid, TokioInstant::now()));
            Ok(Forked::Parent(pid))
        }

        fn reap(&mut self) -> Vec<WorkerExit> {
            self.0.lock().unwrap().pending.drain(..).collect()
        }

        fn signal_group(&mut self, sig: Signal) {
            self.0.lock().unwrap().group_signals.push(sig);
        }
    }

    struct RecordingKill(Arc<Mutex<Vec<Vec<u32>>>>);

    impl KillHook for RecordingKill {
        fn kill_all(&self, workers: &[u32]) {
            self.0.lock().unwrap().push(workers.to_vec());
        }
    }

    fn test_pool(driver: FakeDriver, max_workers: usize) -> WorkerPool<FakeDriver> {
        let mut cfg = SupervisorConfig::default();
        cfg.max_workers = max_workers;
        let task: TaskRef = TaskFn::arc(|| Ok(0));
        cfg.worker_task = Some(task.clone());
        WorkerPool::new(driver, task, &cfg)
    }

    #[tokio::test(start_paused = true)]
    async fn tops_up_to_the_target_count() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 3);

        pool.maintain().await;

        let live = pool.live_workers();
        assert_eq!(live.len(), 3);
        let supervisor = std::process::id();
        for pid in &live {
            assert_ne!(*pid, supervisor);
        }
        // All distinct.
        let mut deduped = live.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn maintain_is_idempotent_when_nothing_exited() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 3);

        pool.maintain().await;
        let before = pool.live_workers();
        pool.maintain().await;

        assert_eq!(pool.live_workers(), before);
        assert_eq!(driver.forked().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_exit_respawns_without_delay() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 1);
        pool.maintain().await;
        let pid = pool.live_workers()[0];

        driver.push_exit(WorkerExit {
            pid,
            code: Some(0),
            signal: None,
        });
        let before = TokioInstant::now();
        pool.maintain().await;

        assert_eq!(pool.live_workers().len(), 1);
        assert_ne!(pool.live_workers()[0], pid);
        let (_, at) = driver.forked()[1];
        assert_eq!(at, before);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_delay_elapses_before_respawn() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 1);
        pool.maintain().await;
        let pid = pool.live_workers()[0];

        driver.push_exit(WorkerExit {
            pid,
            code: Some(1),
            signal: None,
        });
        let before = TokioInstant::now();
        pool.maintain().await;

        let (_, at) = driver.forked()[1];
        assert!(at >= before + Duration::from_secs(5));
        assert_eq!(pool.live_workers().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn signal_death_also_delays_respawn() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 1);
        pool.maintain().await;
        let pid = pool.live_workers()[0];

        driver.push_exit(WorkerExit {
            pid,
            code: None,
            signal: Some(9),
        });
        let before = TokioInstant::now();
        pool.maintain().await;

        let (_, at) = driver.forked()[1];
        assert!(at >= before + Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn fork_failures_retry_with_backoff() {
        let driver = FakeDriver::default();
        driver.fail_next_forks(2);
        let mut pool = test_pool(driver.clone(), 1);

        let before = TokioInstant::now();
        pool.maintain().await;

        // Two failed attempts, one second of retry delay each.
        assert_eq!(pool.live_workers().len(), 1);
        let (_, at) = driver.forked()[0];
        assert!(at >= before + Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_on_terminate_returns_137() {
        let killed = Arc::new(Mutex::new(Vec::new()));
        let driver = FakeDriver::default();
        let mut cfg = SupervisorConfig::default();
        cfg.max_workers = 2;
        cfg.kill_all = Arc::new(RecordingKill(killed.clone()));
        let task: TaskRef = TaskFn::arc(|| Ok(0));
        cfg.worker_task = Some(task.clone());
        let mut pool = WorkerPool::new(driver.clone(), task, &cfg);

        pool.maintain().await;
        let live = pool.live_workers();
        let before = TokioInstant::now();
        let code = pool.drain(Termination::Terminate).await;

        assert_eq!(code, 137);
        assert_eq!(pool.state(), PoolState::Stopped);
        assert_eq!(*killed.lock().unwrap(), vec![live]);
        assert_eq!(driver.group_signals(), vec![Signal::SIGTERM]);
        assert!(TokioInstant::now() >= before + Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_on_interrupt_returns_130() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver, 1);
        pool.maintain().await;

        assert_eq!(pool.drain(Termination::Interrupt).await, 130);
    }

    #[tokio::test(start_paused = true)]
    async fn draining_ignores_further_events() {
        let driver = FakeDriver::default();
        let mut pool = test_pool(driver.clone(), 2);
        pool.maintain().await;
        pool.drain(Termination::Terminate).await;

        // A late child-exit or terminate must not restart the machinery.
        pool.maintain().await;
        assert_eq!(pool.live_workers().len(), 0);
        assert_eq!(driver.forked().len(), 2);
        assert_eq!(pool.drain(Termination::Terminate).await, 137);
        assert_eq!(driver.group_signals().len(), 1);
    }

    #[test]
    fn backoff_alerts_once_per_burst() {
        let mut backoff = ForkBackoff::default();
        assert!(backoff.should_alert());
        for _ in 0..ForkBackoff::REMIND_AFTER - 1 {
            assert!(!backoff.should_alert());
        }
        // Counter has wrapped: operators get reminded.
        assert!(backoff.should_alert());
    }

    #[test]
    fn backoff_resets_on_success() {
        let mut backoff = ForkBackoff::default();
        assert!(backoff.should_alert());
        assert!(!backoff.should_alert());
        backoff.reset();
        assert!(backoff.should_alert());
    }
}
