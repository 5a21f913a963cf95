use std::fs;
use std::io;
use std::path::Path;

use stepwise_core::SchemaVersion;

use crate::fs_utils::write_synced;
use crate::{InstallLayout, MigrationError, StoreIdentity};

/// Plain-file records of the installed schema version, one file per
/// identity. A missing record reads as the sentinel version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStore {
    layout: InstallLayout,
}

impl VersionStore {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn get_kernel_version(&self) -> Result<SchemaVersion, MigrationError> {
        self.get(&StoreIdentity::Kernel)
    }

    pub fn set_kernel_version(&self, version: &SchemaVersion) -> Result<(), MigrationError> {
        self.set(&StoreIdentity::Kernel, version)
    }

    pub fn get_package_version(
        &self,
        vendor: &str,
        name: &str,
    ) -> Result<SchemaVersion, MigrationError> {
        self.get(&StoreIdentity::package(vendor, name)?)
    }

    pub fn set_package_version(
        &self,
        version: &SchemaVersion,
        vendor: &str,
        name: &str,
    ) -> Result<(), MigrationError> {
        self.set(&StoreIdentity::package(vendor, name)?, version)
    }

    pub fn get(&self, identity: &StoreIdentity) -> Result<SchemaVersion, MigrationError> {
        self.layout.ensure_configured()?;
        read_version_record(&self.layout.version_record_path(identity))
    }

    /// Overwrites the record; vendor directories are created on demand.
    pub fn set(
        &self,
        identity: &StoreIdentity,
        version: &SchemaVersion,
    ) -> Result<(), MigrationError> {
        self.layout.ensure_configured()?;
        let path = self.layout.version_record_path(identity);
        write_synced(&path, version.as_str().as_bytes())
            .map_err(|source| MigrationError::StoreUnwritable { path, source })
    }
}

fn read_version_record(path: &Path) -> Result<SchemaVersion, MigrationError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(SchemaVersion::sentinel());
        }
        Err(source) => {
            return Err(MigrationError::StoreUnreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(SchemaVersion::sentinel());
    }

    SchemaVersion::parse(trimmed).map_err(|source| MigrationError::StoreCorrupt {
        path: path.to_path_buf(),
        source,
    })
}
