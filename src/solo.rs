//! Solo mode: one task, no pool.
//!
//! Used when a solo task is configured instead of a worker task. The task
//! runs on a blocking thread while the control loop keeps handling signals:
//! reconfigure invokes only the hook (there is no pool to top up), and a
//! terminating signal ends the supervisor with the same 128+signal status
//! as pool mode, abandoning the task.

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::pidfile::PidFile;
use crate::reporter::{report_all, Severity};
use crate::signals::{SignalListener, SupervisorEvent, Termination};
use crate::supervisor::finish;

pub(crate) async fn run(
    cfg: &SupervisorConfig,
    signals: &mut SignalListener,
    mut pid_file: Option<PidFile>,
) -> Result<i32> {
    let Some(task) = cfg.solo_task.clone() else {
        return Err(Error::Config("no solo task configured".to_string()));
    };
    let reporters = cfg.reporters.clone();
    report_all(
        &reporters,
        Severity::Notice,
        &format!("running solo, pid {}", std::process::id()),
    );

    let mut job = tokio::task::spawn_blocking(move || task.run());

    loop {
        tokio::select! {
            result = &mut job => {
                let code = match result {
                    Ok(Ok(code)) => code,
                    Ok(Err(err)) => {
                        report_all(&reporters, Severity::Alert, &format!("solo task failed: {err}"));
                        1
                    }
                    Err(err) => {
                        report_all(&reporters, Severity::Fatal, &format!("solo task panicked: {err}"));
                        1
                    }
                };
                return Ok(finish(pid_file.take(), code));
            }
            event = signals.wait() => match event {
                SupervisorEvent::Reconfigure => cfg.reconfigure.on_reconfigure(&[]),
                SupervisorEvent::Terminate => {
                    return Ok(finish(pid_file.take(), Termination::Terminate.exit_code()));
                }
                SupervisorEvent::Interrupt => {
                    return Ok(finish(pid_file.take(), Termination::Interrupt.exit_code()));
                }
                SupervisorEvent::ChildExited => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::hooks::TaskFn;

    #[tokio::test]
    async fn task_exit_code_passes_through() {
        let mut cfg = SupervisorConfig::default();
        cfg.solo_task = Some(TaskFn::arc(|| Ok(7)));
        let mut signals = SignalListener::new().unwrap();

        let code = run(&cfg, &mut signals, None).await.unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn task_error_becomes_status_1() {
        let mut cfg = SupervisorConfig::default();
        cfg.solo_task = Some(TaskFn::arc(|| Err(TaskError::fail("boom"))));
        let mut signals = SignalListener::new().unwrap();

        let code = run(&cfg, &mut signals, None).await.unwrap();
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn pid_file_removed_when_task_completes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("solo.pid");
        let pid_file = PidFile::create(&path).unwrap();

        let mut cfg = SupervisorConfig::default();
        cfg.solo_task = Some(TaskFn::arc(|| Ok(0)));
        let mut signals = SignalListener::new().unwrap();

        let code = run(&cfg, &mut signals, Some(pid_file)).await.unwrap();
        assert_eq!(code, 0);
        assert!(!path.exists());
    }
}
