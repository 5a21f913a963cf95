use std::path::Path;

use stepwise_core::{next_hop, Direction, GraphError, SchemaVersion, VersionCatalog};

use crate::error_log::{append_failure, FailureRecord};
use crate::{
    FailurePolicy, InstallLayout, LockClaim, MigrationError, MigrationRegistry,
    ReconcileOutcome, StoreIdentity, UpdateLock, VersionStore,
};

/// Walks the version chain of one install root, one hop at a time.
#[derive(Debug)]
pub struct MigrationRunner {
    layout: InstallLayout,
    store: VersionStore,
    lock: UpdateLock,
    registry: MigrationRegistry,
    policy: FailurePolicy,
}

impl MigrationRunner {
    pub fn new(layout: InstallLayout, registry: MigrationRegistry) -> Self {
        Self {
            store: VersionStore::new(layout.clone()),
            lock: UpdateLock::new(layout.clone()),
            layout,
            registry,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn lock(&self) -> &UpdateLock {
        &self.lock
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Upgrades the kernel schema to `target` unless it is already there or
    /// beyond. Never downgrades.
    pub fn ensure_kernel_at_least(
        &self,
        target: &SchemaVersion,
    ) -> Result<ReconcileOutcome, MigrationError> {
        let current = self.store.get_kernel_version()?;
        if current >= *target {
            return Ok(ReconcileOutcome::UpToDate);
        }
        self.reconcile(
            &current,
            target,
            &self.layout.kernel_rules_dir(),
            &StoreIdentity::Kernel,
        )
    }

    /// Upgrades a package schema to `target` using the catalog in
    /// `rules_dir`. Never downgrades.
    pub fn ensure_package_at_least(
        &self,
        target: &SchemaVersion,
        vendor: &str,
        name: &str,
        rules_dir: &Path,
    ) -> Result<ReconcileOutcome, MigrationError> {
        let identity = StoreIdentity::package(vendor, name)?;
        let current = self.store.get(&identity)?;
        if current >= *target {
            return Ok(ReconcileOutcome::UpToDate);
        }
        self.reconcile(&current, target, rules_dir, &identity)
    }

    /// Moves the kernel schema to exactly `target`, downgrading if needed.
    pub fn migrate_kernel_to(
        &self,
        target: &SchemaVersion,
    ) -> Result<ReconcileOutcome, MigrationError> {
        let current = self.store.get_kernel_version()?;
        self.reconcile(
            &current,
            target,
            &self.layout.kernel_rules_dir(),
            &StoreIdentity::Kernel,
        )
    }

    /// Moves a package schema to exactly `target`, downgrading if needed.
    pub fn migrate_package_to(
        &self,
        target: &SchemaVersion,
        vendor: &str,
        name: &str,
        rules_dir: &Path,
    ) -> Result<ReconcileOutcome, MigrationError> {
        let identity = StoreIdentity::package(vendor, name)?;
        let current = self.store.get(&identity)?;
        self.reconcile(&current, target, rules_dir, &identity)
    }

    /// Runs every hop from `from` to `to` under the update lock, recording
    /// the new version after each successful step.
    ///
    /// The catalog is read from `rules_dir` on every call. A held lock yields
    /// [`ReconcileOutcome::Busy`] without touching anything.
    pub fn reconcile(
        &self,
        from: &SchemaVersion,
        to: &SchemaVersion,
        rules_dir: &Path,
        identity: &StoreIdentity,
    ) -> Result<ReconcileOutcome, MigrationError> {
        if from == to {
            return Ok(ReconcileOutcome::UpToDate);
        }

        if self.lock.is_locked()? {
            tracing::debug!(%identity, %from, %to, "update lock held; skipping reconciliation");
            return Ok(ReconcileOutcome::Busy);
        }
        let guard = match self.lock.acquire()? {
            LockClaim::Acquired(guard) => guard,
            LockClaim::Held => {
                tracing::debug!(%identity, %from, %to, "update lock claimed concurrently");
                return Ok(ReconcileOutcome::Busy);
            }
        };

        tracing::info!(
            %identity,
            %from,
            %to,
            policy = self.policy.as_str(),
            "reconciling schema version"
        );
        let walked = self.walk(from, to, rules_dir, identity);
        let released = guard.release();

        match walked {
            Ok(reached) => {
                released?;
                tracing::info!(%identity, %from, to = %reached, "schema version reconciled");
                Ok(ReconcileOutcome::Updated {
                    from: from.clone(),
                    to: reached,
                })
            }
            Err(err) => {
                if let Err(release_err) = released {
                    tracing::warn!(error = %release_err, "update lock left in place after failure");
                }
                self.handle_failure(from, to, identity, err)
            }
        }
    }

    fn walk(
        &self,
        from: &SchemaVersion,
        to: &SchemaVersion,
        rules_dir: &Path,
        identity: &StoreIdentity,
    ) -> Result<SchemaVersion, MigrationError> {
        let catalog = VersionCatalog::load_dir(rules_dir)?;
        let max_hops = catalog.len() + 1;
        let mut current = from.clone();
        let mut applied = 0_usize;

        while let Some(hop) = next_hop(&catalog, &current, to)? {
            if applied >= max_hops {
                return Err(GraphError::VersionUnreachable {
                    from: from.clone(),
                    to: to.clone(),
                }
                .into());
            }

            let descriptor = catalog.get(&hop.step).ok_or_else(|| {
                GraphError::UnknownCurrentVersion {
                    version: hop.step.clone(),
                }
            })?;
            let key = self.registry.key_for(descriptor);
            let mut step = self.registry.resolve(descriptor, hop.direction)?;

            let result = match hop.direction {
                Direction::Ascending => step.up(),
                Direction::Descending => step.down(),
            };
            if let Err(source) = result {
                return Err(MigrationError::StepFailed {
                    identity: identity.clone(),
                    from: from.clone(),
                    target: to.clone(),
                    reached: current,
                    key,
                    direction: hop.direction,
                    source: source.into(),
                });
            }

            self.store.set(identity, &hop.to)?;
            tracing::info!(
                %identity,
                step = %key,
                direction = hop.direction.as_str(),
                from = %hop.from,
                to = %hop.to,
                "migration step applied"
            );

            current = hop.to;
            applied += 1;
        }

        Ok(current)
    }

    fn handle_failure(
        &self,
        from: &SchemaVersion,
        to: &SchemaVersion,
        identity: &StoreIdentity,
        err: MigrationError,
    ) -> Result<ReconcileOutcome, MigrationError> {
        append_failure(
            &self.layout,
            &FailureRecord {
                identity,
                from,
                to,
                error: &err,
            },
        );

        match (self.policy, err) {
            (FailurePolicy::BestEffort, MigrationError::StepFailed { reached, source, .. }) => {
                tracing::warn!(
                    %identity,
                    %from,
                    %to,
                    %reached,
                    error = %source,
                    "migration halted"
                );
                Ok(ReconcileOutcome::Halted {
                    from: from.clone(),
                    reached,
                    target: to.clone(),
                    reason: source.to_string(),
                })
            }
            (_, err) => {
                tracing::error!(%identity, %from, %to, error = %err, "migration failed");
                Err(err)
            }
        }
    }
}
