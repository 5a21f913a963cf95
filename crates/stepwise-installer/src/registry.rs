use std::collections::BTreeMap;
use std::fmt;

use stepwise_core::{Direction, MigrationStepDescriptor};

use crate::MigrationError;

/// A schema change that can be applied and reverted.
///
/// The runner invokes each step at most once per hop per reconciliation. A
/// step that succeeded right before a crash may run again on the next
/// reconciliation, because its version record was never written.
pub trait MigrationStep {
    fn up(&mut self) -> anyhow::Result<()>;

    fn down(&mut self) -> anyhow::Result<()>;

    /// Steps returning `false` refuse to be walked backward.
    fn reversible(&self) -> bool {
        true
    }
}

pub type StepFactory = Box<dyn Fn() -> Box<dyn MigrationStep>>;

/// Maps catalog handler names to step factories, keyed `namespace\class`.
pub struct MigrationRegistry {
    default_namespace: String,
    factories: BTreeMap<String, StepFactory>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::with_default_namespace("")
    }

    /// Descriptors without a namespace resolve under `namespace`.
    pub fn with_default_namespace(namespace: &str) -> Self {
        Self {
            default_namespace: normalize_namespace(namespace).to_string(),
            factories: BTreeMap::new(),
        }
    }

    pub fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    pub fn register<F, S>(&mut self, namespace: &str, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> S + 'static,
        S: MigrationStep + 'static,
    {
        let key = handler_key(normalize_namespace(namespace), class);
        self.factories.insert(
            key,
            Box::new(move || Box::new(factory()) as Box<dyn MigrationStep>),
        );
        self
    }

    pub fn register_default<F, S>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> S + 'static,
        S: MigrationStep + 'static,
    {
        let namespace = self.default_namespace.clone();
        self.register(&namespace, class, factory)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn key_for(&self, descriptor: &MigrationStepDescriptor) -> String {
        let namespace = descriptor
            .handler_namespace
            .as_deref()
            .map(normalize_namespace)
            .unwrap_or(&self.default_namespace);
        handler_key(namespace, &descriptor.handler_name)
    }

    /// Builds the step for `descriptor` and checks it can run in `direction`.
    pub fn resolve(
        &self,
        descriptor: &MigrationStepDescriptor,
        direction: Direction,
    ) -> Result<Box<dyn MigrationStep>, MigrationError> {
        let key = self.key_for(descriptor);
        let factory = self
            .factories
            .get(&key)
            .ok_or_else(|| MigrationError::UnknownMigrationHandler { key: key.clone() })?;

        let step = factory();
        if direction == Direction::Descending && !step.reversible() {
            return Err(MigrationError::ContractViolation { key, direction });
        }
        Ok(step)
    }
}

impl Default for MigrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("default_namespace", &self.default_namespace)
            .field("handlers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn normalize_namespace(namespace: &str) -> &str {
    namespace.trim().trim_matches('\\')
}

fn handler_key(namespace: &str, class: &str) -> String {
    let class = class.trim().trim_start_matches('\\');
    if namespace.is_empty() {
        class.to_string()
    } else {
        format!("{namespace}\\{class}")
    }
}
