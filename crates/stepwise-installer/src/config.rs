use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{default_install_root, FailurePolicy, InstallLayout, MigrationRegistry, MigrationRunner};

/// Optional `stepwise.toml` settings. Every field may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepwiseConfig {
    #[serde(default)]
    pub install_root: Option<PathBuf>,
    #[serde(default)]
    pub default_namespace: Option<String>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl StepwiseConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse stepwise config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to load config: {}", path.display()))
    }

    /// Like [`StepwiseConfig::load`], but a missing file yields defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to inspect config: {}", path.display()))
            }
        }
    }

    /// Install root precedence: explicit override, then the config file,
    /// then [`default_install_root`].
    pub fn resolve_install_root(&self, override_root: Option<&Path>) -> Result<PathBuf> {
        if let Some(root) = override_root {
            return Ok(root.to_path_buf());
        }
        if let Some(root) = &self.install_root {
            return Ok(root.clone());
        }
        default_install_root()
    }

    /// Registry with this config's default namespace and no handlers yet.
    pub fn registry(&self) -> MigrationRegistry {
        MigrationRegistry::with_default_namespace(
            self.default_namespace.as_deref().unwrap_or_default(),
        )
    }

    pub fn runner(&self, layout: InstallLayout, registry: MigrationRegistry) -> MigrationRunner {
        MigrationRunner::new(layout, registry).with_policy(self.failure_policy)
    }
}
