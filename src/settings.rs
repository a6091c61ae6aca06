//! Option file for the reference daemon.
//!
//! The daemon accepts a TOML file mirroring its command-line flags;
//! anything given on the command line wins over the file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

/// Options loadable from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Target user (numeric id or account name).
    pub user: Option<String>,
    /// Target group (numeric id or group name).
    pub group: Option<String>,
    /// Working directory for the daemon.
    pub working_dir: Option<PathBuf>,
    /// Pid file path.
    pub pid_file: Option<PathBuf>,
    /// Detach from the terminal.
    pub daemon: Option<bool>,
    /// Target number of workers.
    pub workers: Option<usize>,
    /// Run the command once, inline, instead of a worker pool.
    pub solo: Option<bool>,
    /// Command and arguments each worker runs.
    pub command: Option<Vec<String>>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            user = "nobody"
            group = "65534"
            working_dir = "/var/lib/preforkd"
            pid_file = "/run/preforkd.pid"
            daemon = true
            workers = 4
            command = ["sh", "-c", "echo hi"]
            "#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.user.as_deref(), Some("nobody"));
        assert_eq!(settings.workers, Some(4));
        assert_eq!(settings.daemon, Some(true));
        assert_eq!(
            settings.command,
            Some(vec!["sh".into(), "-c".into(), "echo hi".into()])
        );
        assert_eq!(settings.solo, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "retries = 10").unwrap();
        assert!(Settings::from_file(file.path()).is_err());
    }
}
