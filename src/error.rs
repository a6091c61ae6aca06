//! Error types for the supervisor and for task callbacks.

use thiserror::Error;

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the supervisor itself.
///
/// Everything here is fatal and occurs before the control loop starts:
/// bad configuration, or an OS-level failure while detaching, creating the
/// session, or switching identity. Once the loop is running, fork failures
/// and abnormal worker exits are handled with retry and backoff and never
/// surface as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing required setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A symbolic user name did not resolve to an account.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// A symbolic group name did not resolve to a group.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// The background fork failed.
    #[error("failed to fork into the background: {0}")]
    Detach(#[source] nix::Error),

    /// Could not become a session leader.
    #[error("failed to start a new session: {0}")]
    Session(#[source] nix::Error),

    /// The OS refused a user or group switch.
    #[error("failed to switch to {kind} {id}: {source}")]
    Identity {
        kind: &'static str,
        id: u32,
        #[source]
        source: nix::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Nix error
    #[error("system error: {0}")]
    Sys(#[from] nix::Error),
}

/// Errors raised inside a worker or solo task.
///
/// A task error never crashes the supervisor: it is reported at alert
/// severity and converted to exit status 1 by the process that ran the task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task execution failed.
    #[error("execution failed: {error}")]
    Fail { error: String },

    /// IO error raised while running the task.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaskError {
    /// Shorthand for a [`TaskError::Fail`] with the given message.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }
}
