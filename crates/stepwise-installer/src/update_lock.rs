use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs_utils::remove_file_if_exists;
use crate::{InstallLayout, MigrationError};

/// Presence-only marker guarding an install root against overlapping
/// reconciliations.
///
/// The marker is advisory. Claiming uses create-new semantics, which is
/// atomic on local filesystems but not on every network filesystem, and a
/// process killed mid-run leaves the marker behind until it is cleared by
/// hand with [`UpdateLock::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLock {
    layout: InstallLayout,
}

#[derive(Debug)]
pub enum LockClaim {
    Acquired(UpdateLockGuard),
    Held,
}

/// Removes the marker when dropped.
#[derive(Debug)]
pub struct UpdateLockGuard {
    path: PathBuf,
    released: bool,
}

impl UpdateLock {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    pub fn path(&self) -> PathBuf {
        self.layout.update_lock_path()
    }

    pub fn is_locked(&self) -> Result<bool, MigrationError> {
        self.layout.ensure_configured()?;
        Ok(self.path().exists())
    }

    /// Claims the marker without waiting. A marker that already exists is
    /// reported as [`LockClaim::Held`] and left untouched.
    pub fn acquire(&self) -> Result<LockClaim, MigrationError> {
        self.layout.ensure_configured()?;
        let path = self.path();

        if let Err(source) = fs::create_dir_all(self.layout.root()) {
            return Err(MigrationError::LockUnwritable {
                path,
                source: Some(source),
            });
        }

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Ok(LockClaim::Held);
            }
            Err(source) => {
                return Err(MigrationError::LockUnwritable {
                    path,
                    source: Some(source),
                });
            }
        }

        if !path.exists() {
            return Err(MigrationError::LockUnwritable { path, source: None });
        }

        tracing::debug!(path = %path.display(), "update lock acquired");
        Ok(LockClaim::Acquired(UpdateLockGuard {
            path,
            released: false,
        }))
    }

    /// Removes the marker if present. Removing an absent marker succeeds.
    pub fn release(&self) -> Result<(), MigrationError> {
        self.layout.ensure_configured()?;
        remove_marker(&self.path())
    }
}

impl UpdateLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) -> Result<(), MigrationError> {
        self.released = true;
        remove_marker(&self.path)
    }
}

impl Drop for UpdateLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = remove_marker(&self.path) {
            tracing::warn!(error = %err, "failed to release update lock");
        }
    }
}

fn remove_marker(path: &Path) -> Result<(), MigrationError> {
    remove_file_if_exists(path).map_err(|source| MigrationError::LockUnreleasable {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "update lock released");
    Ok(())
}
