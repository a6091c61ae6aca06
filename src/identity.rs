//! Privilege and environment handling.
//!
//! Identity is resolved once from configuration (numeric text or symbolic
//! name) and applied once at daemon start: group before user, since the OS
//! may refuse to drop the group after user privilege is already gone.
//! Applying an identity that is already current is a no-op.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;

use nix::unistd::{chown, getgid, getuid, setgid, setuid, Gid, Uid};
use tracing::{debug, warn};
use users::{get_group_by_name, get_user_by_name};

use crate::error::{Error, Result};
use crate::reporter::{report_all, ReporterRef, Severity};

/// Resolved (uid, gid) pair. Compute-once, apply-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    uid: Option<Uid>,
    gid: Option<Gid>,
}

impl ProcessIdentity {
    /// Resolve the configured user/group to numeric ids.
    ///
    /// Numeric text is taken as-is; anything else goes through the account
    /// database. An unknown name is a configuration error and fatal to the
    /// whole process.
    pub fn resolve(user: Option<&str>, group: Option<&str>) -> Result<Self> {
        let uid = match user {
            None => None,
            Some(value) => Some(resolve_uid(value)?),
        };
        let gid = match group {
            None => None,
            Some(value) => Some(resolve_gid(value)?),
        };
        Ok(Self { uid, gid })
    }

    pub fn uid(&self) -> Option<Uid> {
        self.uid
    }

    pub fn gid(&self) -> Option<Gid> {
        self.gid
    }

    /// Recommend an explicit identity when running as the superuser.
    pub fn warn_if_superuser(&self, reporters: &[ReporterRef]) {
        if self.uid.is_none() && Uid::effective().is_root() {
            report_all(
                reporters,
                Severity::Warning,
                "running as superuser; configure an explicit user to drop privileges",
            );
        }
    }

    /// Switch the process to the resolved identity.
    ///
    /// Group first, then user. Ids that already match the current process
    /// are skipped. An OS refusal here aborts startup.
    pub fn apply(&self) -> Result<()> {
        if let Some(gid) = self.gid {
            if getgid() != gid {
                setgid(gid).map_err(|source| Error::Identity {
                    kind: "group",
                    id: gid.as_raw(),
                    source,
                })?;
                debug!(gid = gid.as_raw(), "switched group");
            }
        }
        if let Some(uid) = self.uid {
            if getuid() != uid {
                setuid(uid).map_err(|source| Error::Identity {
                    kind: "user",
                    id: uid.as_raw(),
                    source,
                })?;
                debug!(uid = uid.as_raw(), "switched user");
            }
        }
        Ok(())
    }
}

fn resolve_uid(value: &str) -> Result<Uid> {
    if let Ok(id) = value.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    let user = get_user_by_name(value).ok_or_else(|| Error::UnknownUser(value.to_string()))?;
    Ok(Uid::from_raw(user.uid()))
}

fn resolve_gid(value: &str) -> Result<Gid> {
    if let Ok(id) = value.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    let group = get_group_by_name(value).ok_or_else(|| Error::UnknownGroup(value.to_string()))?;
    Ok(Gid::from_raw(group.gid()))
}

/// Create, chown, and enter the working directory.
///
/// The directory is created owner-only if absent. Ownership is changed to
/// the target identity opportunistically: the directory may be externally
/// managed, so a chown failure is logged and startup continues.
pub(crate) fn prepare_working_dir(dir: &Path, identity: &ProcessIdentity) -> Result<()> {
    if !dir.is_dir() {
        DirBuilder::new().recursive(true).mode(0o700).create(dir)?;
        debug!(dir = %dir.display(), "created working directory");
    }

    if identity.uid().is_some() || identity.gid().is_some() {
        if let Err(err) = chown(dir, identity.uid(), identity.gid()) {
            warn!(dir = %dir.display(), error = %err, "could not change working directory ownership");
        }
    }

    std::env::set_current_dir(dir)?;
    Ok(())
}
