mod config;
mod error_log;
mod fs_utils;
mod layout;
mod registry;
mod runner;
mod types;
mod update_lock;
mod version_store;

pub use config::StepwiseConfig;
pub use error_log::{append_failure, FailureRecord};
pub use layout::{
    default_install_root, InstallLayout, CONFIG_FILE, ERROR_LOG_FILE, KERNEL_VERSION_FILE,
    UPDATE_LOCK_FILE,
};
pub use registry::{MigrationRegistry, MigrationStep, StepFactory};
pub use runner::MigrationRunner;
pub use types::{
    FailurePolicy, MigrationError, PackageIdentity, ReconcileOutcome, StepError, StoreIdentity,
};
pub use update_lock::{LockClaim, UpdateLock, UpdateLockGuard};
pub use version_store::VersionStore;
