//! Terminal detachment for background mode.
//!
//! One fork (the parent exits 0 without waiting), then a new session so the
//! process loses its controlling terminal. Standard streams are redirected
//! to the null device separately, just before the control loop, so that
//! nothing a library writes can fail against a closed terminal.

use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;

use nix::unistd::{dup2, fork, setsid, ForkResult};
use tracing::debug;

use crate::error::{Error, Result};

/// Fork into the background and become a session leader.
///
/// In the parent branch this function does not return; the parent exits
/// immediately with status 0. The child continues as the supervisor.
pub(crate) fn detach() -> Result<()> {
    // SAFETY: the child performs no allocation between the fork and the
    // return to the caller; the parent only calls _exit-equivalent code.
    match unsafe { fork() }.map_err(Error::Detach)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(Error::Session)?;
    debug!("detached from controlling terminal");
    Ok(())
}

/// Point stdin/stdout/stderr at the null device.
///
/// Called after signal handlers are installed and just before the control
/// loop when running in the background.
pub(crate) fn redirect_stdio() -> Result<()> {
    let null = OpenOptions::new().read(true).write(true).open("/dev/null")?;
    let fd = null.as_raw_fd();
    for stream in 0..=2 {
        dup2(fd, stream)?;
    }
    Ok(())
}
