//! Pid file handling.
//!
//! The pid file records the supervisor's process id for external tooling.
//! It is written at daemon start and removed only on the controlled
//! shutdown path; a crashed supervisor leaves it in place.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// On-disk record of the supervisor's pid.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id, as decimal text plus newline.
    pub fn create(path: &Path) -> std::io::Result<Self> {
        fs::write(path, format!("{}\n", std::process::id()))?;
        debug!(path = %path.display(), "wrote pid file");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file. Failures are logged; there is nothing further to do
    /// with them on the way out.
    pub fn remove(self) {
        if let Err(err) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %err, "failed to remove pid file");
        }
    }
}
