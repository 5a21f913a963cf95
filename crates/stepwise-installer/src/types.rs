use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use stepwise_core::{CatalogError, Direction, GraphError, SchemaVersion, VersionError};
use thiserror::Error;

pub type StepError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Whose version record a reconciliation reads and advances.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreIdentity {
    Kernel,
    Package(PackageIdentity),
}

/// A vendor/package pair whose segments are safe to use as path components.
/// Only constructible through [`PackageIdentity::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    vendor: String,
    name: String,
}

impl PackageIdentity {
    pub fn new(vendor: &str, name: &str) -> Result<Self, MigrationError> {
        validate_identity_segment("vendor", vendor)?;
        validate_identity_segment("package", name)?;
        Ok(Self {
            vendor: vendor.to_string(),
            name: name.to_string(),
        })
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vendor, self.name)
    }
}

impl StoreIdentity {
    pub fn package(vendor: &str, name: &str) -> Result<Self, MigrationError> {
        PackageIdentity::new(vendor, name).map(Self::Package)
    }
}

impl fmt::Display for StoreIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel => f.write_str("kernel"),
            Self::Package(package) => fmt::Display::fmt(package, f),
        }
    }
}

pub(crate) fn validate_identity_segment(kind: &str, value: &str) -> Result<(), MigrationError> {
    let invalid = |reason: &str| MigrationError::InvalidPackageIdentity {
        value: value.to_string(),
        reason: format!("{kind} name {reason}"),
    };

    if value.trim().is_empty() {
        return Err(invalid("must not be empty"));
    }
    if value == "." || value == ".." {
        return Err(invalid("must not be a relative path component"));
    }
    if value.chars().any(|ch| matches!(ch, '/' | '\\' | '\0')) {
        return Err(invalid("must not contain path separators"));
    }

    Ok(())
}

/// How the runner treats an error raised by a migration step.
///
/// Configuration, graph and handler errors always propagate regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Return the step error to the caller.
    #[default]
    Strict,
    /// Log the step error and report [`ReconcileOutcome::Halted`].
    BestEffort,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::BestEffort => "best-effort",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    UpToDate,
    Updated {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    /// Another reconciliation holds the update lock; nothing was done.
    Busy,
    /// A step failed under [`FailurePolicy::BestEffort`]; `reached` is the
    /// last recorded version.
    Halted {
        from: SchemaVersion,
        reached: SchemaVersion,
        target: SchemaVersion,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("install root is not configured")]
    StoreNotConfigured,
    #[error("invalid package identity '{value}': {reason}")]
    InvalidPackageIdentity { value: String, reason: String },
    #[error("failed to read version record: {}", path.display())]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("version record holds an invalid version: {}", path.display())]
    StoreCorrupt {
        path: PathBuf,
        #[source]
        source: VersionError,
    },
    #[error("failed to write version record: {}", path.display())]
    StoreUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("update lock could not be created (install root not writable?): {}", path.display())]
    LockUnwritable {
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },
    #[error("failed to remove update lock: {}", path.display())]
    LockUnreleasable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("no migration handler registered for '{key}'")]
    UnknownMigrationHandler { key: String },
    #[error("migration handler '{key}' cannot run {}", direction.as_str())]
    ContractViolation { key: String, direction: Direction },
    #[error(
        "migration '{key}' failed running {} for {identity} (update from {from} to {target}, recorded version {reached})",
        direction.as_str()
    )]
    StepFailed {
        identity: StoreIdentity,
        from: SchemaVersion,
        target: SchemaVersion,
        reached: SchemaVersion,
        key: String,
        direction: Direction,
        #[source]
        source: StepError,
    },
}
