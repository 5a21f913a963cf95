use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::version::{SchemaVersion, VersionError};

pub const BASE_CATALOG_FILE: &str = "versions.json";
pub const OVERRIDE_CATALOG_FILE: &str = "custom_versions.json";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("version catalog not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read version catalog: {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse version catalog: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid version key in catalog: {}", path.display())]
    InvalidVersion {
        path: PathBuf,
        #[source]
        source: VersionError,
    },
    #[error(
        "catalog {} lists version '{version}', which does not sort above the initial version 0",
        path.display()
    )]
    NotAboveSentinel { path: PathBuf, version: String },
    #[error(
        "duplicate version in catalog {}: '{first}' and '{second}' name the same version",
        path.display()
    )]
    DuplicateVersion {
        path: PathBuf,
        first: String,
        second: String,
    },
}

/// One catalog entry: the handler that moves the schema into (up) or back
/// out of (down) `version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStepDescriptor {
    pub version: SchemaVersion,
    pub handler_name: String,
    pub handler_namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    details: BTreeMap<String, CatalogDocumentEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocumentEntry {
    class: String,
    #[serde(default)]
    namespace: Option<String>,
}

/// Merged, read-only mapping from version to step descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    entries: BTreeMap<SchemaVersion, MigrationStepDescriptor>,
}

impl VersionCatalog {
    /// Loads `base_path` and, when it exists, merges `override_path` on top.
    pub fn load(base_path: &Path, override_path: Option<&Path>) -> Result<Self, CatalogError> {
        if !base_path.exists() {
            return Err(CatalogError::NotFound(base_path.to_path_buf()));
        }

        let mut entries = read_catalog_document(base_path)?;
        if let Some(override_path) = override_path.filter(|path| path.exists()) {
            for (version, descriptor) in read_catalog_document(override_path)? {
                // Remove first so the override's raw key spelling wins too.
                entries.remove(&version);
                entries.insert(version, descriptor);
            }
        }

        Ok(Self { entries })
    }

    /// Loads `versions.json` and the optional `custom_versions.json` from a
    /// rules directory.
    pub fn load_dir(rules_dir: &Path) -> Result<Self, CatalogError> {
        Self::load(
            &rules_dir.join(BASE_CATALOG_FILE),
            Some(&rules_dir.join(OVERRIDE_CATALOG_FILE)),
        )
    }

    pub fn from_entries(entries: impl IntoIterator<Item = MigrationStepDescriptor>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|descriptor| (descriptor.version.clone(), descriptor))
                .collect(),
        }
    }

    pub fn get(&self, version: &SchemaVersion) -> Option<&MigrationStepDescriptor> {
        self.entries.get(version)
    }

    pub fn contains(&self, version: &SchemaVersion) -> bool {
        self.entries.contains_key(version)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn min(&self) -> Option<&SchemaVersion> {
        self.entries.keys().next()
    }

    /// Descriptors in ascending version order.
    pub fn iter(&self) -> impl Iterator<Item = &MigrationStepDescriptor> {
        self.entries.values()
    }

    pub(crate) fn versions(&self) -> &BTreeMap<SchemaVersion, MigrationStepDescriptor> {
        &self.entries
    }
}

fn read_catalog_document(
    path: &Path,
) -> Result<BTreeMap<SchemaVersion, MigrationStepDescriptor>, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog_document(path, &content)
}

pub(crate) fn parse_catalog_document(
    path: &Path,
    content: &str,
) -> Result<BTreeMap<SchemaVersion, MigrationStepDescriptor>, CatalogError> {
    let document: CatalogDocument =
        serde_json::from_str(content).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut entries = BTreeMap::new();
    for (raw_version, entry) in document.details {
        let version =
            SchemaVersion::parse(&raw_version).map_err(|source| CatalogError::InvalidVersion {
                path: path.to_path_buf(),
                source,
            })?;
        // Only the sentinel sits at or below "0"; such a key could never be
        // stepped into or out of.
        if version <= SchemaVersion::sentinel() {
            return Err(CatalogError::NotAboveSentinel {
                path: path.to_path_buf(),
                version: raw_version,
            });
        }
        let descriptor = MigrationStepDescriptor {
            version: version.clone(),
            handler_name: entry.class,
            handler_namespace: entry.namespace.filter(|namespace| !namespace.is_empty()),
        };

        match entries.entry(version) {
            Entry::Vacant(slot) => {
                slot.insert(descriptor);
            }
            Entry::Occupied(existing) => {
                return Err(CatalogError::DuplicateVersion {
                    path: path.to_path_buf(),
                    first: existing.key().to_string(),
                    second: raw_version,
                });
            }
        }
    }

    Ok(entries)
}
