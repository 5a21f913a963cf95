use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{MigrationError, StoreIdentity};

pub const KERNEL_VERSION_FILE: &str = "db_version.lock";
pub const UPDATE_LOCK_FILE: &str = "updating.lock";
pub const ERROR_LOG_FILE: &str = "update-errors.log";
pub const CONFIG_FILE: &str = "stepwise.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_configured(&self) -> Result<(), MigrationError> {
        if self.root.as_os_str().is_empty() {
            return Err(MigrationError::StoreNotConfigured);
        }
        Ok(())
    }

    /// Rules directory holding the kernel's `versions.json`.
    pub fn kernel_rules_dir(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn kernel_version_path(&self) -> PathBuf {
        self.root.join(KERNEL_VERSION_FILE)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    pub fn vendor_dir(&self, vendor: &str) -> PathBuf {
        self.modules_dir().join(vendor)
    }

    pub fn package_version_path(&self, vendor: &str, name: &str) -> PathBuf {
        self.vendor_dir(vendor).join(format!("{name}.version.lock"))
    }

    pub fn version_record_path(&self, identity: &StoreIdentity) -> PathBuf {
        match identity {
            StoreIdentity::Kernel => self.kernel_version_path(),
            StoreIdentity::Package(package) => {
                self.package_version_path(package.vendor(), package.name())
            }
        }
    }

    pub fn update_lock_path(&self) -> PathBuf {
        self.root.join(UPDATE_LOCK_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.root.join(ERROR_LOG_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }
}

pub fn default_install_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os("STEPWISE_INSTALL_ROOT").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(root));
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows install root")?;
        return Ok(PathBuf::from(app_data).join("Stepwise"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve install root")?;
    Ok(PathBuf::from(home).join(".stepwise"))
}
