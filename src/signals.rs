//! OS signal handling.
//!
//! The supervisor consumes four signals: child-exit (SIGCHLD), reconfigure
//! (SIGHUP), terminate (SIGTERM), and interrupt (SIGINT). The OS-level trap
//! is a thin adapter: [`SignalListener`] turns deliveries into
//! [`SupervisorEvent`] values consumed by one control loop, so every state
//! transition happens in ordinary code. The listener is the loop's single
//! event source, which serializes handling: a child-exit and a terminate
//! arriving together can never interleave registry updates.

use std::fmt;
use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Events driving the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// One or more children have exited (SIGCHLD; deliveries may coalesce).
    ChildExited,
    /// Reconfigure request (SIGHUP).
    Reconfigure,
    /// Terminate request (SIGTERM).
    Terminate,
    /// Interrupt (SIGINT, Ctrl-C in a terminal).
    Interrupt,
}

/// Which terminating signal ended the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

impl Termination {
    /// The 128+signal exit status expected by shells and process monitors.
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Interrupt => 128 + 2,
            Termination::Terminate => 128 + 9,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Interrupt => f.write_str("interrupt"),
            Termination::Terminate => f.write_str("terminate"),
        }
    }
}

/// Adapter from OS signals to [`SupervisorEvent`]s.
pub struct SignalListener {
    sigchld: Signal,
    sighup: Signal,
    sigterm: Signal,
    sigint: Signal,
}

impl SignalListener {
    /// Install handlers for every signal the supervisor consumes.
    ///
    /// Installing the handlers also makes the supervisor immune to the
    /// group-wide terminate it sends during forced shutdown.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            sigchld: signal(SignalKind::child())?,
            sighup: signal(SignalKind::hangup())?,
            sigterm: signal(SignalKind::terminate())?,
            sigint: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next signal.
    pub async fn wait(&mut self) -> SupervisorEvent {
        tokio::select! {
            _ = self.sigchld.recv() => SupervisorEvent::ChildExited,
            _ = self.sighup.recv() => SupervisorEvent::Reconfigure,
            _ = self.sigterm.recv() => SupervisorEvent::Terminate,
            _ = self.sigint.recv() => SupervisorEvent::Interrupt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_maps_to_130() {
        assert_eq!(Termination::Interrupt.exit_code(), 130);
    }

    #[test]
    fn terminate_maps_to_137() {
        assert_eq!(Termination::Terminate.exit_code(), 137);
    }
}
